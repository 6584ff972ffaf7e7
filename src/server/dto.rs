use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::types::{Album, Photo, TagSet, User};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

// Users

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUserResponse {
    pub username: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for RegisteredUserResponse {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// Albums

/// Only `title` is writable. Anything else a client sends, such as `owner`,
/// `created_at` or `photos_amount`, is dropped during deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct AlbumRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Joins every value given for `key` with commas, so `?k=a&k=b` reads the
/// same as `?k=a,b`.
fn joined(pairs: &[(String, String)], key: &str) -> Option<String> {
    let values: Vec<&str> = pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect();
    (!values.is_empty()).then(|| values.join(","))
}

#[derive(Debug, Default)]
pub struct ListAlbumsParams {
    pub ordering: Option<String>,
}

impl From<Vec<(String, String)>> for ListAlbumsParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self {
            ordering: joined(&pairs, "ordering"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub id: i64,
    pub title: String,
    pub owner: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub photos_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<PhotoResponse>>,
}

impl AlbumResponse {
    #[must_use]
    pub fn summary(album: Album) -> Self {
        Self {
            id: album.id,
            title: album.title,
            owner: album.owner_username,
            created_at: album.created_at,
            photos_amount: album.photos_amount,
            photos: None,
        }
    }

    #[must_use]
    pub fn detail(album: Album, photos: Vec<PhotoResponse>) -> Self {
        Self {
            photos: Some(photos),
            ..Self::summary(album)
        }
    }
}

// Photos

/// Tags as they arrive in a JSON body: a list, or a string holding a JSON
/// list (the multipart convention, also accepted here).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireTags {
    List(Vec<String>),
    Encoded(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePhotoRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<WireTags>,
}

#[derive(Debug, Default)]
pub struct ListPhotosParams {
    pub ordering: Option<String>,
    /// Comma separated album ids.
    pub album: Option<String>,
    /// Comma separated tag names.
    pub tags: Option<String>,
}

impl From<Vec<(String, String)>> for ListPhotosParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self {
            ordering: joined(&pairs, "ordering"),
            album: joined(&pairs, "album"),
            tags: joined(&pairs, "tags"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: i64,
    pub title: String,
    pub photo: String,
    pub thumbnail: String,
    pub album: i64,
    pub album_title: String,
    pub owner: String,
    pub tags: Vec<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl PhotoResponse {
    #[must_use]
    pub fn new(photo: Photo, media_url: &str) -> Self {
        Self {
            id: photo.id,
            title: photo.title,
            photo: media_link(media_url, &photo.files.original),
            thumbnail: media_link(media_url, &photo.files.thumbnail),
            album: photo.album_id,
            album_title: photo.album_title,
            owner: photo.owner_username,
            tags: tags_to_wire(&photo.tags),
            uploaded_at: photo.uploaded_at,
        }
    }
}

fn media_link(media_url: &str, key: &str) -> String {
    format!("{}/{key}", media_url.trim_end_matches('/'))
}

// Tag wire mapping

/// Converts wire tags to the stored set. Surrounding whitespace is trimmed,
/// blank entries are dropped, duplicates collapse and case is preserved.
#[must_use]
pub fn tags_from_wire<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[must_use]
pub fn tags_to_wire(tags: &TagSet) -> Vec<String> {
    tags.iter().cloned().collect()
}

/// Interprets one tags value from a form or an encoded JSON body field.
///
/// A value that parses as a JSON list of strings contributes every element,
/// anything else is taken as a single tag name.
#[must_use]
pub fn tags_from_form_value(value: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(value) {
        Ok(list) => list,
        Err(_) => vec![value.to_string()],
    }
}

impl WireTags {
    #[must_use]
    pub fn into_tag_set(self) -> TagSet {
        match self {
            WireTags::List(list) => tags_from_wire(list),
            WireTags::Encoded(value) => tags_from_wire(tags_from_form_value(&value)),
        }
    }
}
