mod filter;
mod schema;
mod sqlite;

pub use filter::{
    AlbumOrderField, OrderField, OwnerScope, PhotoFilter, PhotoOrderField, SortKey,
    parse_ordering,
};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Album and photo reads take an [`OwnerScope`]; rows outside the scope are
/// reported exactly like rows that do not exist.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    /// Returns `Error::AlreadyExists` if the username is taken.
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        date_joined: DateTime<Utc>,
    ) -> Result<User>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // Token operations
    /// Returns `Error::TokenCollision` if the key is already in use and
    /// `Error::AlreadyExists` if the user already has a token.
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_user_token(&self, user_id: i64) -> Result<Option<Token>>;
    fn get_user_by_token(&self, key: &str) -> Result<Option<User>>;

    // Album operations
    fn create_album(&self, album: &NewAlbum) -> Result<Album>;
    fn get_album(&self, scope: &OwnerScope, id: i64) -> Result<Option<Album>>;
    fn list_albums(
        &self,
        scope: &OwnerScope,
        ordering: &[SortKey<AlbumOrderField>],
    ) -> Result<Vec<Album>>;
    fn update_album_title(&self, scope: &OwnerScope, id: i64, title: &str) -> Result<()>;
    /// Deletes the album and all of its photos in one transaction. Returns
    /// the blob keys of the removed photos, or `None` if nothing was deleted.
    fn delete_album(&self, scope: &OwnerScope, id: i64) -> Result<Option<Vec<PhotoFiles>>>;

    // Photo operations
    fn create_photo(&self, photo: &NewPhoto) -> Result<Photo>;
    fn get_photo(&self, scope: &OwnerScope, id: i64) -> Result<Option<Photo>>;
    fn list_photos(
        &self,
        scope: &OwnerScope,
        filter: &PhotoFilter,
        ordering: &[SortKey<PhotoOrderField>],
    ) -> Result<Vec<Photo>>;
    fn update_photo(&self, scope: &OwnerScope, id: i64, changes: &PhotoChanges) -> Result<()>;
    /// Swaps the blob keys of a photo. Returns the previous keys.
    fn replace_photo_files(
        &self,
        scope: &OwnerScope,
        id: i64,
        files: &PhotoFiles,
    ) -> Result<PhotoFiles>;
    /// Returns the blob keys of the removed photo, or `None` if nothing was deleted.
    fn delete_photo(&self, scope: &OwnerScope, id: i64) -> Result<Option<PhotoFiles>>;
}
