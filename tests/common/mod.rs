#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use albumhost::config::ServerConfig;
use albumhost::server::{AppState, create_router};
use albumhost::store::{SqliteStore, Store};

pub const PASSWORD: &str = "password123";
const BOUNDARY: &str = "albumhost-test-boundary";

/// An in-process server over a temp data directory.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub config: ServerConfig,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(ServerConfig::default().max_upload_bytes)
    }

    pub fn with_upload_limit(max_upload_bytes: u64) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            max_upload_bytes,
            ..ServerConfig::default()
        };
        std::fs::create_dir_all(config.media_dir()).expect("create media dir");

        let store = SqliteStore::new(config.db_path()).expect("open store");
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState::new(Arc::new(store), &config));
        let router = create_router(state);

        Self {
            temp_dir,
            config,
            router,
        }
    }

    pub async fn response(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to get response")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.response(request).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, value)
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.json("GET", uri, Some(token), None).await
    }

    pub async fn register(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.json(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.json(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Registers a user and returns their token.
    pub async fn user(&self, username: &str) -> String {
        let (status, _) = self.register(username, PASSWORD).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.login(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_album(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .json(
                "POST",
                "/api/v1/albums",
                Some(token),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().expect("album id")
    }

    pub async fn upload(&self, token: &str, form: MultipartForm) -> (StatusCode, Value) {
        self.send(form.request("POST", "/api/v1/photos", token, true))
            .await
    }

    pub async fn upload_photo(
        &self,
        token: &str,
        album_id: i64,
        title: &str,
        tags: &[&str],
    ) -> Value {
        let mut form = MultipartForm::new()
            .text("title", title)
            .text("album", &album_id.to_string())
            .file("photo", "holiday.png", "image/png", &png_bytes(300, 200));
        for tag in tags {
            form = form.text("tags", tag);
        }
        let (status, body) = self.upload(token, form).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    pub fn media_dir(&self) -> PathBuf {
        self.config.media_dir()
    }

    /// Files stored under final media keys.
    pub fn media_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.media_dir(), &mut files);
        let staging = self.media_dir().join(".staging");
        files.retain(|f| !f.starts_with(&staging));
        files
    }

    /// Uploads still sitting in the staging directory.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(&self.media_dir().join(".staging"), &mut files);
        files
    }

    /// Resolves a `photo` or `thumbnail` link to its path on disk.
    pub fn media_path(&self, link: &str) -> PathBuf {
        let key = link
            .strip_prefix(&format!("{}/", self.config.media_url))
            .expect("link under media url");
        self.media_dir().join(key)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("encode image");
    buf.into_inner()
}

/// Builds a `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_body(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    /// Builds the request. `declare_length` controls whether a
    /// `Content-Length` header is sent.
    pub fn request(
        self,
        method: &str,
        uri: &str,
        token: &str,
        declare_length: bool,
    ) -> Request<Body> {
        let body = self.into_body();
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if declare_length {
            builder = builder.header(header::CONTENT_LENGTH, body.len());
        }
        builder.body(Body::from(body)).expect("build request")
    }
}
