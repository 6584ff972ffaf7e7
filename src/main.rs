use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use albumhost::config::ServerConfig;
use albumhost::server::{AppState, create_router};
use albumhost::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "albumhost")]
#[command(about = "A photo album server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database and media directory
    Init {
        /// Data directory for the database and uploaded media
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Start the server
    Serve {
        /// TOML config file. Flags below override its values.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and uploaded media
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Largest accepted photo upload request, in bytes
        #[arg(long)]
        max_upload_bytes: Option<u64>,

        /// Prefix for photo and thumbnail links in responses
        #[arg(long)]
        media_url: Option<String>,
    },
}

/// Creates everything the server needs under the data directory. Safe to
/// run more than once.
fn prepare_data_dir(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    fs::create_dir_all(&config.data_dir)?;
    fs::create_dir_all(config.media_dir())?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("albumhost=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            let config = ServerConfig {
                data_dir,
                ..ServerConfig::default()
            };
            prepare_data_dir(&config)?;

            println!("Initialized database at {}", config.db_path().display());
            println!("Media will be stored in {}", config.media_dir().display());
        }
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            max_upload_bytes,
            media_url,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::from_file(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(max_upload_bytes) = max_upload_bytes {
                config.max_upload_bytes = max_upload_bytes;
            }
            if let Some(media_url) = media_url {
                config.media_url = media_url;
            }
            config.validate()?;

            let store = prepare_data_dir(&config)?;
            let state = Arc::new(AppState::new(Arc::new(store), &config));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!(
                "Starting server on {} (data: {}, upload limit: {} bytes)",
                addr,
                config.data_dir.display(),
                config.max_upload_bytes
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
