use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::error::{Error, Result as StoreResult};
use crate::media::{BlobError, UploadTooLarge};

pub const FILE_TOO_LARGE: &str = "File size exceeds maximum allowed";

/// API error that converts to a `{"detail": ...}` response.
///
/// `detail` is a plain message, or a map of field name to messages for
/// validation failures.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: Value,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: Value::String(message.into()),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 400 with the message attached to a single field.
    #[must_use]
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: json!({ field: [message.into()] }),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, FILE_TOO_LARGE)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<UploadTooLarge> for ApiError {
    fn from(e: UploadTooLarge) -> Self {
        tracing::debug!("Rejected upload: {e}");
        Self::payload_too_large()
    }
}

impl From<BlobError> for ApiError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::TooLarge(e) => e.into(),
            e => {
                tracing::error!("Blob storage failure: {e}");
                Self::internal("Failed to store file")
            }
        }
    }
}

/// Extension trait for converting store results to API errors with a custom message.
///
/// The underlying cause is logged; clients only see the message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| store_error(e, message))
    }
}

/// Maps a library error to its HTTP form. Unexpected failures are logged
/// with `message` as context and reported as a generic 500.
pub fn store_error(e: Error, message: &'static str) -> ApiError {
    match e {
        Error::NotFound => ApiError::not_found("Not found."),
        Error::InvalidImage(detail) => ApiError::validation("photo", detail),
        e => {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        }
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
