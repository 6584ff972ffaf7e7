use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post, put},
};

use super::{albums, photos, users};
use crate::config::ServerConfig;
use crate::media::{BlobStore, UploadLimit};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: BlobStore,
    pub upload_limit: UploadLimit,
    /// Prefix for the `photo` and `thumbnail` links in responses.
    pub media_url: String,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &ServerConfig) -> Self {
        Self {
            store,
            blobs: BlobStore::new(&config.media_dir()),
            upload_limit: UploadLimit::new(config.max_upload_bytes),
            media_url: config.media_url.clone(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
}

fn album_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/albums",
            get(albums::list_albums).post(albums::create_album),
        )
        .route(
            "/albums/{id}",
            get(albums::get_album)
                .patch(albums::update_album)
                .delete(albums::delete_album),
        )
}

/// Photo routes carry a body limit equal to the upload limit, so a body
/// without a declared length is cut off once it grows past it.
fn photo_router(limit: UploadLimit) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(limit.max_bytes()).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/photos",
            get(photos::list_photos).post(photos::create_photo),
        )
        .route(
            "/photos/{id}",
            get(photos::get_photo)
                .patch(photos::update_photo)
                .delete(photos::delete_photo),
        )
        .route("/photos/{id}/image", put(photos::replace_image))
        .layer(DefaultBodyLimit::max(body_limit))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(user_router())
        .merge(album_router())
        .merge(photo_router(state.upload_limit));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
