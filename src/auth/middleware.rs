use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{
    AuthenticationError, CredentialError, authenticate, extract_credential,
};
use crate::server::AppState;
use crate::types::User;

/// Extractor that requires an authenticated user. The user is the identity
/// every authorization decision is made against.
pub struct RequireUser {
    pub user: User,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    InvalidCredentials,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            ),
            AuthError::InvalidScheme => {
                (StatusCode::UNAUTHORIZED, "Invalid authorization scheme.")
            }
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token."),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username/password.")
            }
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "detail": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"albumhost\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let credential = extract_credential(auth_header)
            .map_err(|e| match e {
                CredentialError::InvalidScheme => AuthError::InvalidScheme,
                CredentialError::Malformed => AuthError::InvalidToken,
            })?
            .ok_or(AuthError::MissingAuth)?;

        let user = authenticate(state.store.as_ref(), &credential)
            .await
            .map_err(|e| match e {
                AuthenticationError::InvalidToken => AuthError::InvalidToken,
                AuthenticationError::InvalidCredentials => AuthError::InvalidCredentials,
                AuthenticationError::InternalError => AuthError::InternalError,
            })?;

        Ok(RequireUser { user })
    }
}
