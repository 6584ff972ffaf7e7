use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::Utc;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::access::{NOT_FOUND, authorize_mutation, parse_id, scope_list};
use crate::server::dto::{AlbumRequest, AlbumResponse, ListAlbumsParams, PhotoResponse};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_title;
use crate::store::{PhotoFilter, Store, parse_ordering};
use crate::types::{Album, NewAlbum};

fn album_detail(
    state: &AppState,
    auth: &RequireUser,
    album: Album,
) -> Result<AlbumResponse, ApiError> {
    let filter = PhotoFilter {
        album_ids: vec![album.id],
        ..PhotoFilter::default()
    };
    let photos = state
        .store
        .list_photos(&scope_list(&auth.user), &filter, &[])
        .api_err("Failed to list photos")?
        .into_iter()
        .map(|photo| PhotoResponse::new(photo, &state.media_url))
        .collect();
    Ok(AlbumResponse::detail(album, photos))
}

/// GET /albums
pub async fn list_albums(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<AlbumResponse>>, ApiError> {
    let Query(pairs) = query?;
    let params = ListAlbumsParams::from(pairs);
    let ordering = parse_ordering(params.ordering.as_deref());
    let albums = state
        .store
        .list_albums(&scope_list(&auth.user), &ordering)
        .api_err("Failed to list albums")?;

    Ok(Json(albums.into_iter().map(AlbumResponse::summary).collect()))
}

/// POST /albums
pub async fn create_album(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AlbumRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AlbumResponse>), ApiError> {
    let Json(req) = payload?;
    let title = validate_title(req.title.as_deref())?;

    let album = state
        .store
        .create_album(&NewAlbum {
            owner_id: auth.user.id,
            title,
            created_at: Utc::now(),
        })
        .api_err("Failed to create album")?;

    tracing::info!("User {} created album {}", auth.user.username, album.id);

    Ok((
        StatusCode::CREATED,
        Json(AlbumResponse::detail(album, Vec::new())),
    ))
}

/// GET /albums/{id}
pub async fn get_album(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let id = parse_id(&id)?;
    let album = state
        .store
        .get_album(&scope_list(&auth.user), id)
        .api_err("Failed to get album")?
        .or_not_found(NOT_FOUND)?;

    Ok(Json(album_detail(&state, &auth, album)?))
}

/// PATCH /albums/{id}
pub async fn update_album(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AlbumRequest>, JsonRejection>,
) -> Result<Json<AlbumResponse>, ApiError> {
    let id = parse_id(&id)?;
    let scope = scope_list(&auth.user);
    let store = state.store.as_ref();

    let album = store.get_album(&scope, id).api_err("Failed to get album")?;
    let album = authorize_mutation(&auth.user, album)?;

    let Json(req) = payload?;
    if req.title.is_some() {
        let title = validate_title(req.title.as_deref())?;
        store
            .update_album_title(&scope, album.id, &title)
            .api_err("Failed to update album")?;
    }

    let album = store
        .get_album(&scope, album.id)
        .api_err("Failed to get album")?
        .or_not_found(NOT_FOUND)?;

    Ok(Json(AlbumResponse::summary(album)))
}

/// DELETE /albums/{id}
///
/// Rows go first, in one transaction. Blob removal failures after that are
/// logged and do not bring the album back.
pub async fn delete_album(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let scope = scope_list(&auth.user);

    let album = state
        .store
        .get_album(&scope, id)
        .api_err("Failed to get album")?;
    let album = authorize_mutation(&auth.user, album)?;

    let files = state
        .store
        .delete_album(&scope, album.id)
        .api_err("Failed to delete album")?
        .or_not_found(NOT_FOUND)?;

    for photo_files in &files {
        for key in [&photo_files.original, &photo_files.thumbnail] {
            if let Err(e) = state.blobs.delete(key).await {
                tracing::warn!("Failed to remove blob {key}: {e}");
            }
        }
    }
    if let Err(e) = state.blobs.delete_album_dir(album.owner_id, album.id).await {
        tracing::warn!("Failed to remove media directory of album {}: {e}", album.id);
    }

    tracing::info!(
        "User {} deleted album {} with {} photos",
        auth.user.username,
        album.id,
        files.len()
    );

    Ok(StatusCode::NO_CONTENT)
}
