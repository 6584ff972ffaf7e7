//! Owner-only access decisions for albums and photos.
//!
//! A caller never learns whether a resource they do not own exists: every
//! denial is reported as 404.

use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::store::{OwnerScope, Store};
use crate::types::{Album, Owned, User};

pub const NOT_FOUND: &str = "Not found.";
pub const ALBUM_NOT_FOUND: &str = "album not found";

/// Scope for list and detail reads.
#[must_use]
pub fn scope_list(user: &User) -> OwnerScope {
    OwnerScope::of(user)
}

/// Path ids that are not integers cannot name any resource.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found(NOT_FOUND))
}

/// Allows an update or delete only for the owner of the resource.
pub fn authorize_mutation<R: Owned>(user: &User, resource: Option<R>) -> Result<R, ApiError> {
    match resource {
        Some(resource) if resource.owner_id() == user.id => Ok(resource),
        _ => Err(ApiError::not_found(NOT_FOUND)),
    }
}

/// Resolves the album a new photo is uploaded into. An album that is absent
/// or belongs to someone else is rejected the same way.
pub fn authorize_creation_parent(
    store: &dyn Store,
    user: &User,
    album_id: i64,
) -> Result<Album, ApiError> {
    let album = store
        .get_album(&scope_list(user), album_id)
        .api_err("Failed to load album")?
        .or_not_found(ALBUM_NOT_FOUND)?;
    authorize_mutation(user, Some(album)).map_err(|_| ApiError::not_found(ALBUM_NOT_FOUND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::store::SqliteStore;
    use crate::types::NewAlbum;

    fn setup() -> (TempDir, SqliteStore, User, User) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let alice = store.create_user("alice", "hash", Utc::now()).unwrap();
        let bob = store.create_user("bob", "hash", Utc::now()).unwrap();
        (temp, store, alice, bob)
    }

    fn album_of(store: &SqliteStore, owner: &User) -> Album {
        store
            .create_album(&NewAlbum {
                owner_id: owner.id,
                title: "Trip".to_string(),
                created_at: Utc::now(),
            })
            .unwrap()
    }

    #[test]
    fn test_authorize_mutation() {
        let (_temp, store, alice, bob) = setup();
        let album = album_of(&store, &alice);

        assert!(authorize_mutation(&alice, Some(album.clone())).is_ok());

        let denied = authorize_mutation(&bob, Some(album)).unwrap_err();
        assert_eq!(denied.status, StatusCode::NOT_FOUND);

        let missing = authorize_mutation::<Album>(&alice, None).unwrap_err();
        assert_eq!(missing.status, denied.status);
        assert_eq!(missing.detail, denied.detail);
    }

    #[test]
    fn test_creation_parent_denial_matches_absence() {
        let (_temp, store, alice, bob) = setup();
        let album = album_of(&store, &alice);

        assert_eq!(
            authorize_creation_parent(&store, &alice, album.id).unwrap().id,
            album.id
        );

        let foreign = authorize_creation_parent(&store, &bob, album.id).unwrap_err();
        let absent = authorize_creation_parent(&store, &bob, album.id + 100).unwrap_err();
        for err in [foreign, absent] {
            assert_eq!(err.status, StatusCode::NOT_FOUND);
            assert_eq!(err.detail, json!(ALBUM_NOT_FOUND));
        }
    }

    #[test]
    fn test_scope_list_uses_identity() {
        let (_temp, _store, alice, bob) = setup();
        assert_eq!(scope_list(&alice).owner_id(), alice.id);
        assert_ne!(scope_list(&alice), scope_list(&bob));
    }
}
