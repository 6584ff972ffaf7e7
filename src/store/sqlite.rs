use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::Store;
use super::filter::{
    AlbumOrderField, OwnerScope, PhotoFilter, PhotoOrderField, SortKey, order_by_clause,
};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const ALBUM_SELECT: &str = "SELECT a.id, a.owner_id, u.username, a.title, a.created_at,
        (SELECT COUNT(*) FROM photos p WHERE p.album_id = a.id) AS photos_amount
     FROM albums a JOIN users u ON u.id = a.owner_id";

const PHOTO_SELECT: &str = "SELECT p.id, p.owner_id, u.username, p.album_id, a.title, p.title,
        p.original_key, p.thumbnail_key, p.uploaded_at
     FROM photos p
     JOIN users u ON u.id = p.owner_id
     JOIN albums a ON a.id = p.album_id";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width RFC 3339 so that string order matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        date_joined: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_username: row.get(2)?,
        title: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        photos_amount: row.get(5)?,
    })
}

/// Tags are loaded separately, see [`load_tags`].
fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        owner_username: row.get(2)?,
        album_id: row.get(3)?,
        album_title: row.get(4)?,
        title: row.get(5)?,
        files: PhotoFiles {
            original: row.get(6)?,
            thumbnail: row.get(7)?,
        },
        tags: TagSet::new(),
        uploaded_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn load_tags(conn: &Connection, photo_id: i64) -> Result<TagSet> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM tags t
         JOIN photo_tags pt ON pt.tag_id = t.id
         WHERE pt.photo_id = ?1",
    )?;
    let names = stmt.query_map(params![photo_id], |row| row.get::<_, String>(0))?;
    names
        .collect::<std::result::Result<TagSet, _>>()
        .map_err(Error::from)
}

/// Replaces the tag set of a photo, creating missing tags on the way.
fn set_tags(conn: &Connection, photo_id: i64, tags: &TagSet) -> Result<()> {
    conn.execute("DELETE FROM photo_tags WHERE photo_id = ?1", params![photo_id])?;

    for name in tags {
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
        conn.execute(
            "INSERT INTO photo_tags (photo_id, tag_id) SELECT ?1, id FROM tags WHERE name = ?2",
            params![photo_id, name],
        )?;
    }
    Ok(())
}

fn load_album(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Album>> {
    conn.query_row(
        &format!("{ALBUM_SELECT} WHERE a.id = ?1 AND a.owner_id = ?2"),
        params![id, owner_id],
        album_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn load_photo(conn: &Connection, owner_id: i64, id: i64) -> Result<Option<Photo>> {
    let photo = conn
        .query_row(
            &format!("{PHOTO_SELECT} WHERE p.id = ?1 AND p.owner_id = ?2"),
            params![id, owner_id],
            photo_from_row,
        )
        .optional()?;

    match photo {
        Some(mut photo) => {
            photo.tags = load_tags(conn, photo.id)?;
            Ok(Some(photo))
        }
        None => Ok(None),
    }
}

fn photo_exists(conn: &Connection, owner_id: i64, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM photos WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        date_joined: DateTime<Utc>,
    ) -> Result<User> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, date_joined) VALUES (?1, ?2, ?3)",
            params![username, password_hash, format_datetime(&date_joined)],
        );

        match result {
            Ok(_) => {}
            Err(e) if constraint_code(&e).is_some() => return Err(Error::AlreadyExists),
            Err(e) => return Err(Error::from(e)),
        }

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            date_joined,
        })
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, password_hash, date_joined FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token.key, token.user_id, format_datetime(&token.created_at)],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) => match constraint_code(&e) {
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => Err(Error::TokenCollision),
                Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Err(Error::NotFound),
                Some(_) => Err(Error::AlreadyExists),
                None => Err(Error::from(e)),
            },
        }
    }

    fn get_user_token(&self, user_id: i64) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT key, user_id, created_at FROM tokens WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Token {
                    key: row.get(0)?,
                    user_id: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_token(&self, key: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT u.id, u.username, u.password_hash, u.date_joined
             FROM tokens t JOIN users u ON u.id = t.user_id
             WHERE t.key = ?1",
            params![key],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Album operations

    fn create_album(&self, album: &NewAlbum) -> Result<Album> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO albums (owner_id, title, created_at) VALUES (?1, ?2, ?3)",
            params![album.owner_id, album.title, format_datetime(&album.created_at)],
        )?;
        let id = conn.last_insert_rowid();

        load_album(&conn, album.owner_id, id)?.ok_or(Error::NotFound)
    }

    fn get_album(&self, scope: &OwnerScope, id: i64) -> Result<Option<Album>> {
        load_album(&self.conn(), scope.owner_id(), id)
    }

    fn list_albums(
        &self,
        scope: &OwnerScope,
        ordering: &[SortKey<AlbumOrderField>],
    ) -> Result<Vec<Album>> {
        let conn = self.conn();
        let sql = format!(
            "{ALBUM_SELECT} WHERE a.owner_id = ?1 {}",
            order_by_clause(ordering, "a.id")
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![scope.owner_id()], album_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_album_title(&self, scope: &OwnerScope, id: i64, title: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE albums SET title = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![title, id, scope.owner_id()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_album(&self, scope: &OwnerScope, id: i64) -> Result<Option<Vec<PhotoFiles>>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let owner_id = scope.owner_id();

        let found: Option<i64> = tx
            .query_row(
                "SELECT id FROM albums WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Ok(None);
        }

        let files = {
            let mut stmt = tx.prepare(
                "SELECT original_key, thumbnail_key FROM photos
                 WHERE album_id = ?1 AND owner_id = ?2 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![id, owner_id], |row| {
                Ok(PhotoFiles {
                    original: row.get(0)?,
                    thumbnail: row.get(1)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.execute(
            "DELETE FROM photos WHERE album_id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        tx.execute(
            "DELETE FROM albums WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;

        tx.commit()?;
        Ok(Some(files))
    }

    // Photo operations

    fn create_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let result = tx.execute(
            "INSERT INTO photos (owner_id, album_id, title, original_key, thumbnail_key, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                photo.owner_id,
                photo.album_id,
                photo.title,
                photo.files.original,
                photo.files.thumbnail,
                format_datetime(&photo.uploaded_at),
            ],
        );

        match result {
            Ok(_) => {}
            // The album is missing or belongs to someone else
            Err(e) if constraint_code(&e) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                return Err(Error::NotFound);
            }
            Err(e) => return Err(Error::from(e)),
        }

        let id = tx.last_insert_rowid();
        set_tags(&tx, id, &photo.tags)?;
        tx.commit()?;

        load_photo(&conn, photo.owner_id, id)?.ok_or(Error::NotFound)
    }

    fn get_photo(&self, scope: &OwnerScope, id: i64) -> Result<Option<Photo>> {
        load_photo(&self.conn(), scope.owner_id(), id)
    }

    fn list_photos(
        &self,
        scope: &OwnerScope,
        filter: &PhotoFilter,
        ordering: &[SortKey<PhotoOrderField>],
    ) -> Result<Vec<Photo>> {
        let conn = self.conn();

        let mut sql = format!("{PHOTO_SELECT} WHERE p.owner_id = ?");
        let mut values = vec![Value::Integer(scope.owner_id())];

        if !filter.album_ids.is_empty() {
            sql.push_str(&format!(
                " AND p.album_id IN ({})",
                placeholders(filter.album_ids.len())
            ));
            values.extend(filter.album_ids.iter().map(|id| Value::Integer(*id)));
        }

        if !filter.tags.is_empty() {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM photo_tags pt JOIN tags t ON t.id = pt.tag_id
                  WHERE pt.photo_id = p.id AND t.name IN ({}))",
                placeholders(filter.tags.len())
            ));
            values.extend(filter.tags.iter().map(|t| Value::Text(t.clone())));
        }

        sql.push(' ');
        sql.push_str(&order_by_clause(ordering, "p.id"));

        let mut photos = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), photo_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        for photo in &mut photos {
            photo.tags = load_tags(&conn, photo.id)?;
        }

        Ok(photos)
    }

    fn update_photo(&self, scope: &OwnerScope, id: i64, changes: &PhotoChanges) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let owner_id = scope.owner_id();

        if !photo_exists(&tx, owner_id, id)? {
            return Err(Error::NotFound);
        }

        if let Some(title) = &changes.title {
            tx.execute(
                "UPDATE photos SET title = ?1 WHERE id = ?2 AND owner_id = ?3",
                params![title, id, owner_id],
            )?;
        }
        if let Some(tags) = &changes.tags {
            set_tags(&tx, id, tags)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn replace_photo_files(
        &self,
        scope: &OwnerScope,
        id: i64,
        files: &PhotoFiles,
    ) -> Result<PhotoFiles> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let owner_id = scope.owner_id();

        let previous = tx
            .query_row(
                "SELECT original_key, thumbnail_key FROM photos WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                |row| {
                    Ok(PhotoFiles {
                        original: row.get(0)?,
                        thumbnail: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        tx.execute(
            "UPDATE photos SET original_key = ?1, thumbnail_key = ?2 WHERE id = ?3 AND owner_id = ?4",
            params![files.original, files.thumbnail, id, owner_id],
        )?;

        tx.commit()?;
        Ok(previous)
    }

    fn delete_photo(&self, scope: &OwnerScope, id: i64) -> Result<Option<PhotoFiles>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let owner_id = scope.owner_id();

        let files = tx
            .query_row(
                "SELECT original_key, thumbnail_key FROM photos WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                |row| {
                    Ok(PhotoFiles {
                        original: row.get(0)?,
                        thumbnail: row.get(1)?,
                    })
                },
            )
            .optional()?;

        if files.is_some() {
            tx.execute(
                "DELETE FROM photos WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            tx.commit()?;
        }

        Ok(files)
    }
}
