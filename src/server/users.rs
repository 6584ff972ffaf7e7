use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};
use chrono::Utc;

use crate::auth::{CredentialHasher, generate_key};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CredentialsRequest, RegisteredUserResponse, TokenResponse};
use crate::server::response::{ApiError, StoreResultExt, store_error};
use crate::server::validation::{REQUIRED, validate_password, validate_username};
use crate::store::Store;
use crate::types::{Token, User};

const MAX_KEY_ATTEMPTS: usize = 3;

/// POST /users/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredUserResponse>), ApiError> {
    let Json(req) = payload?;
    let username = validate_username(req.username.as_deref())?;
    let password = validate_password(req.password.as_deref())?;

    let hash = CredentialHasher::hash_blocking(password.to_string())
        .await
        .api_err("Failed to hash password")?;

    let user = match state.store.create_user(username, &hash, Utc::now()) {
        Ok(user) => user,
        Err(Error::AlreadyExists) => {
            return Err(ApiError::validation(
                "username",
                "A user with that username already exists.",
            ));
        }
        Err(e) => return Err(store_error(e, "Failed to create user")),
    };

    tracing::info!("Registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUserResponse::from(&user)),
    ))
}

/// POST /users/login
///
/// Issues the user's token on first login and returns the same token on
/// every later one.
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload?;
    let username = req
        .username
        .as_deref()
        .ok_or_else(|| ApiError::validation("username", REQUIRED))?;
    let password = req
        .password
        .as_deref()
        .ok_or_else(|| ApiError::validation("password", REQUIRED))?;

    let store = state.store.as_ref();
    let user = store
        .get_user_by_username(username)
        .api_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let valid = CredentialHasher::verify_blocking(password.to_string(), user.password_hash.clone())
        .await
        .api_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::unauthorized("wrong credentials"));
    }

    let token = get_or_create_token(store, &user)?;
    Ok(Json(TokenResponse { token: token.key }))
}

fn get_or_create_token(store: &dyn Store, user: &User) -> Result<Token, ApiError> {
    for _ in 0..MAX_KEY_ATTEMPTS {
        if let Some(token) = store
            .get_user_token(user.id)
            .api_err("Failed to load token")?
        {
            return Ok(token);
        }

        let token = Token {
            key: generate_key(),
            user_id: user.id,
            created_at: Utc::now(),
        };
        match store.create_token(&token) {
            Ok(()) => {
                tracing::debug!("Issued token for user {}", user.username);
                return Ok(token);
            }
            // A concurrent login created the token first; the next pass reads it.
            Err(Error::AlreadyExists) => continue,
            Err(Error::TokenCollision) => {
                tracing::warn!("Token key collision, regenerating");
                continue;
            }
            Err(e) => return Err(store_error(e, "Failed to create token")),
        }
    }

    Err(ApiError::internal("Failed to create token"))
}
