use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored form of a photo's tags. Tags are case-sensitive and deduplicated.
pub type TagSet = BTreeSet<String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub key: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub owner_id: i64,
    pub owner_username: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Derived from the photos referencing this album, never stored.
    pub photos_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub owner_id: i64,
    pub owner_username: String,
    pub album_id: i64,
    pub album_title: String,
    pub title: String,
    pub files: PhotoFiles,
    pub tags: TagSet,
    pub uploaded_at: DateTime<Utc>,
}

/// Blob keys of a photo. The thumbnail is always derived from the original,
/// so both keys are produced and replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoFiles {
    pub original: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub owner_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub owner_id: i64,
    pub album_id: i64,
    pub title: String,
    pub files: PhotoFiles,
    pub tags: TagSet,
    pub uploaded_at: DateTime<Utc>,
}

/// Mutable photo fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct PhotoChanges {
    pub title: Option<String>,
    pub tags: Option<TagSet>,
}

/// Implemented by every resource that belongs to exactly one user.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for Album {
    fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

impl Owned for Photo {
    fn owner_id(&self) -> i64 {
        self.owner_id
    }
}
