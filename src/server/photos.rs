use std::sync::Arc;

use axum::{
    Json,
    extract::{
        FromRequestParts, Multipart, Path, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header::CONTENT_LENGTH, request::Parts},
};
use chrono::Utc;
use image::ImageFormat;

use crate::auth::RequireUser;
use crate::error::Error;
use crate::media::thumbnail::{self, Thumbnail};
use crate::media::{BlobStore, StagedFile, unique_file_name};
use crate::server::AppState;
use crate::server::access::{
    ALBUM_NOT_FOUND, NOT_FOUND, authorize_creation_parent, authorize_mutation, parse_id,
    scope_list,
};
use crate::server::dto::{
    ListPhotosParams, PhotoResponse, UpdatePhotoRequest, tags_from_form_value, tags_from_wire,
};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt, store_error};
use crate::server::validation::{REQUIRED, validate_tags, validate_title};
use crate::store::{PhotoFilter, Store, parse_ordering};
use crate::types::{NewPhoto, PhotoChanges, PhotoFiles, TagSet};

const NO_FILE: &str = "No file was submitted.";

/// Rejects a photo upload whose declared `Content-Length` is over the limit
/// before any of the body is read. Place it after [`RequireUser`] so
/// anonymous requests still get 401.
pub struct UploadAdmission;

impl FromRequestParts<Arc<AppState>> for UploadAdmission {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        state.upload_limit.admit_declared(declared)?;
        Ok(UploadAdmission)
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large()
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// The uploaded image, staged but not yet moved into place.
struct UploadedFile {
    staged: StagedFile,
    file_name: Option<String>,
}

#[derive(Default)]
struct PhotoForm {
    title: Option<String>,
    album: Option<String>,
    tags: Vec<String>,
    photo: Option<UploadedFile>,
}

async fn stage_field(state: &AppState, mut field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let file_name = field.file_name().map(ToString::to_string);
    let mut staged = state.blobs.stage(state.upload_limit).await?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        staged.write(&chunk).await?;
    }

    Ok(UploadedFile { staged, file_name })
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

async fn parse_photo_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<PhotoForm, ApiError> {
    let mut form = PhotoForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("photo") => form.photo = Some(stage_field(state, field).await?),
            Some("title") => form.title = Some(read_text(field).await?),
            Some("album") => form.album = Some(read_text(field).await?),
            Some("tags") => {
                let value = read_text(field).await?;
                form.tags.extend(tags_from_form_value(&value));
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_album_field(raw: Option<&str>) -> Result<i64, ApiError> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty());
    let raw = raw.ok_or_else(|| ApiError::validation("album", REQUIRED))?;
    raw.parse().map_err(|_| {
        ApiError::validation(
            "album",
            format!("Incorrect type. Expected pk value, received {raw:?}."),
        )
    })
}

/// Decodes the upload and renders its thumbnail on the blocking pool.
async fn render_thumbnail(bytes: Vec<u8>) -> Result<(ImageFormat, Thumbnail), ApiError> {
    let rendered = tokio::task::spawn_blocking(move || {
        let source = thumbnail::decode(&bytes)?;
        let thumb = thumbnail::render(&source)?;
        Ok::<_, Error>((source.format, thumb))
    })
    .await
    .map_err(|e| {
        tracing::error!("Thumbnail task failed: {e}");
        ApiError::internal("Failed to process image")
    })?;

    rendered.api_err("Failed to process image")
}

async fn remove_files(blobs: &BlobStore, files: &PhotoFiles) {
    for key in [&files.original, &files.thumbnail] {
        if let Err(e) = blobs.delete(key).await {
            tracing::warn!("Failed to remove blob {key}: {e}");
        }
    }
}

/// Validates the staged upload, renders its thumbnail and moves both files
/// into the album's directory. Nothing is left behind on error.
async fn store_image(
    state: &AppState,
    owner_id: i64,
    album_id: i64,
    mut upload: UploadedFile,
) -> Result<PhotoFiles, ApiError> {
    if upload.staged.is_empty() {
        return Err(ApiError::validation("photo", "The submitted file is empty."));
    }

    let bytes = upload.staged.read().await?;
    let (format, thumb) = render_thumbnail(bytes).await?;

    let file_name = unique_file_name(upload.file_name.as_deref(), thumbnail::extension(format));
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name.as_str(), |(stem, _)| stem);
    let thumb_name = format!("{stem}.{}", thumbnail::extension(thumb.format));

    let files = PhotoFiles {
        original: BlobStore::original_key(owner_id, album_id, &file_name),
        thumbnail: BlobStore::thumbnail_key(owner_id, album_id, &thumb_name),
    };

    state.blobs.commit(upload.staged, &files.original).await?;
    if let Err(e) = state.blobs.put(&files.thumbnail, &thumb.bytes).await {
        remove_files(&state.blobs, &files).await;
        return Err(e.into());
    }

    Ok(files)
}

fn parse_album_filter(raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse()
                .map_err(|_| ApiError::validation("album", "Enter a number."))
        })
        .collect()
}

fn parse_tag_filter(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// GET /photos
pub async fn list_photos(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<PhotoResponse>>, ApiError> {
    let Query(pairs) = query?;
    let params = ListPhotosParams::from(pairs);
    let filter = PhotoFilter {
        album_ids: parse_album_filter(params.album.as_deref())?,
        tags: parse_tag_filter(params.tags.as_deref()),
    };
    let ordering = parse_ordering(params.ordering.as_deref());

    let photos = state
        .store
        .list_photos(&scope_list(&auth.user), &filter, &ordering)
        .api_err("Failed to list photos")?;

    Ok(Json(
        photos
            .into_iter()
            .map(|p| PhotoResponse::new(p, &state.media_url))
            .collect(),
    ))
}

/// POST /photos
pub async fn create_photo(
    auth: RequireUser,
    _admission: UploadAdmission,
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PhotoResponse>), ApiError> {
    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = parse_photo_form(&state, multipart).await?;

    let album_id = parse_album_field(form.album.as_deref())?;
    let album = authorize_creation_parent(state.store.as_ref(), &auth.user, album_id)?;

    let title = validate_title(form.title.as_deref())?;
    let tags: TagSet = tags_from_wire(form.tags);
    validate_tags(&tags)?;
    let upload = form
        .photo
        .ok_or_else(|| ApiError::validation("photo", NO_FILE))?;

    let files = store_image(&state, auth.user.id, album.id, upload).await?;

    let created = state.store.create_photo(&NewPhoto {
        owner_id: auth.user.id,
        album_id: album.id,
        title,
        files: files.clone(),
        tags,
        uploaded_at: Utc::now(),
    });
    let photo = match created {
        Ok(photo) => photo,
        Err(e) => {
            remove_files(&state.blobs, &files).await;
            return Err(match e {
                // The album was deleted while the upload was in flight
                Error::NotFound => ApiError::not_found(ALBUM_NOT_FOUND),
                e => store_error(e, "Failed to create photo"),
            });
        }
    };

    tracing::info!(
        "User {} uploaded photo {} into album {}",
        auth.user.username,
        photo.id,
        album.id
    );

    Ok((
        StatusCode::CREATED,
        Json(PhotoResponse::new(photo, &state.media_url)),
    ))
}

/// GET /photos/{id}
pub async fn get_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PhotoResponse>, ApiError> {
    let id = parse_id(&id)?;
    let photo = state
        .store
        .get_photo(&scope_list(&auth.user), id)
        .api_err("Failed to get photo")?
        .or_not_found(NOT_FOUND)?;

    Ok(Json(PhotoResponse::new(photo, &state.media_url)))
}

/// PATCH /photos/{id}
///
/// Only `title` and `tags` are writable; `tags` replaces the whole set.
pub async fn update_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePhotoRequest>, JsonRejection>,
) -> Result<Json<PhotoResponse>, ApiError> {
    let id = parse_id(&id)?;
    let scope = scope_list(&auth.user);
    let store = state.store.as_ref();

    let photo = store.get_photo(&scope, id).api_err("Failed to get photo")?;
    let photo = authorize_mutation(&auth.user, photo)?;

    let Json(req) = payload?;
    let mut changes = PhotoChanges::default();
    if req.title.is_some() {
        changes.title = Some(validate_title(req.title.as_deref())?);
    }
    if let Some(tags) = req.tags {
        let tags = tags.into_tag_set();
        validate_tags(&tags)?;
        changes.tags = Some(tags);
    }

    store
        .update_photo(&scope, photo.id, &changes)
        .api_err("Failed to update photo")?;

    let photo = store
        .get_photo(&scope, photo.id)
        .api_err("Failed to get photo")?
        .or_not_found(NOT_FOUND)?;

    Ok(Json(PhotoResponse::new(photo, &state.media_url)))
}

/// PUT /photos/{id}/image
///
/// Replaces the original image. The thumbnail is always rendered again and
/// both files get new keys; the old files are removed afterwards.
pub async fn replace_image(
    auth: RequireUser,
    _admission: UploadAdmission,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PhotoResponse>, ApiError> {
    let id = parse_id(&id)?;
    let scope = scope_list(&auth.user);

    let photo = state
        .store
        .get_photo(&scope, id)
        .api_err("Failed to get photo")?;
    let photo = authorize_mutation(&auth.user, photo)?;

    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = parse_photo_form(&state, multipart).await?;
    let upload = form
        .photo
        .ok_or_else(|| ApiError::validation("photo", NO_FILE))?;

    let files = store_image(&state, photo.owner_id, photo.album_id, upload).await?;

    let old_files = match state.store.replace_photo_files(&scope, photo.id, &files) {
        Ok(old) => old,
        Err(e) => {
            remove_files(&state.blobs, &files).await;
            return Err(store_error(e, "Failed to replace photo"));
        }
    };
    remove_files(&state.blobs, &old_files).await;

    tracing::info!("User {} replaced image of photo {}", auth.user.username, photo.id);

    let photo = state
        .store
        .get_photo(&scope, photo.id)
        .api_err("Failed to get photo")?
        .or_not_found(NOT_FOUND)?;

    Ok(Json(PhotoResponse::new(photo, &state.media_url)))
}

/// DELETE /photos/{id}
pub async fn delete_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let scope = scope_list(&auth.user);

    let photo = state
        .store
        .get_photo(&scope, id)
        .api_err("Failed to get photo")?;
    let photo = authorize_mutation(&auth.user, photo)?;

    let files = state
        .store
        .delete_photo(&scope, photo.id)
        .api_err("Failed to delete photo")?
        .or_not_found(NOT_FOUND)?;
    remove_files(&state.blobs, &files).await;

    tracing::info!("User {} deleted photo {}", auth.user.username, photo.id);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_album_field() {
        assert_eq!(parse_album_field(Some(" 12 ")).unwrap(), 12);
        assert_eq!(
            parse_album_field(None).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_album_field(Some("twelve")).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!(parse_album_filter(Some("1, 2,,3")).unwrap(), vec![1, 2, 3]);
        assert!(parse_album_filter(None).unwrap().is_empty());
        assert!(parse_album_filter(Some("1,x")).is_err());

        assert_eq!(parse_tag_filter(Some("sea, Sun ,")), vec!["sea", "Sun"]);
        assert!(parse_tag_filter(Some("")).is_empty());
    }
}
