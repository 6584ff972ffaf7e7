use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::upload::{UploadLimit, UploadTooLarge};

const STAGING_DIR: &str = ".staging";
const MAX_STEM_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found")]
    NotFound,
    #[error("invalid blob key")]
    InvalidKey,
    #[error(transparent)]
    TooLarge(#[from] UploadTooLarge),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem store for original photos and their thumbnails.
///
/// Keys are relative paths of the form `user_{owner}/album_{album}/{file}`.
/// Every write lands in a staging directory first and is moved into place
/// with a rename, so a key either holds complete content or does not exist.
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
}

impl BlobStore {
    pub fn new(media_dir: &Path) -> Self {
        Self {
            base_path: media_dir.to_path_buf(),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn album_prefix(owner_id: i64, album_id: i64) -> String {
        format!("user_{owner_id}/album_{album_id}")
    }

    #[must_use]
    pub fn original_key(owner_id: i64, album_id: i64, file_name: &str) -> String {
        format!("{}/{file_name}", Self::album_prefix(owner_id, album_id))
    }

    #[must_use]
    pub fn thumbnail_key(owner_id: i64, album_id: i64, file_name: &str) -> String {
        format!(
            "{}/thumbnails/thumb_{file_name}",
            Self::album_prefix(owner_id, album_id)
        )
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn staging_path(&self) -> PathBuf {
        self.base_path
            .join(STAGING_DIR)
            .join(Uuid::new_v4().to_string())
    }

    /// Opens a new staging file for a streamed upload.
    pub async fn stage(&self, limit: UploadLimit) -> Result<StagedFile, BlobError> {
        let path = self.staging_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(&path).await?;
        Ok(StagedFile {
            path: Some(path),
            file: Some(file),
            len: 0,
            limit,
        })
    }

    /// Moves a finished staging file to its final key.
    pub async fn commit(&self, mut staged: StagedFile, key: &str) -> Result<(), BlobError> {
        let final_path = self.object_path(key)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        staged.finish().await?;
        let Some(staged_path) = staged.path.as_ref() else {
            return Err(BlobError::NotFound);
        };
        fs::rename(staged_path, &final_path).await?;
        staged.path = None;
        Ok(())
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let final_path = self.object_path(key)?;

        let temp_path = self.staging_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        if let Err(e) = write_all_synced(&mut temp_file, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    #[cfg(test)]
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.object_path(key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound,
            _ => BlobError::Io(e),
        })
    }

    #[cfg(test)]
    pub async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.object_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.object_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    /// Removes whatever is left of an album's directory.
    pub async fn delete_album_dir(&self, owner_id: i64, album_id: i64) -> Result<(), BlobError> {
        let path = self.base_path.join(Self::album_prefix(owner_id, album_id));
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }
}

async fn write_all_synced(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.sync_all().await
}

/// A streamed upload in the staging directory.
///
/// Writes past the upload limit are refused. The file is deleted when the
/// value is dropped without being committed, which covers failed validation
/// as well as a client disconnecting mid-upload.
pub struct StagedFile {
    path: Option<PathBuf>,
    file: Option<File>,
    len: u64,
    limit: UploadLimit,
}

impl StagedFile {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), BlobError> {
        let len = self.len + chunk.len() as u64;
        self.limit.admit_received(len)?;

        let file = self.file.as_mut().ok_or(BlobError::NotFound)?;
        file.write_all(chunk).await?;
        self.len = len;
        Ok(())
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flushes and closes the file, then reads it back.
    pub async fn read(&mut self) -> Result<Vec<u8>, BlobError> {
        self.finish().await?;
        let path = self.path.as_ref().ok_or(BlobError::NotFound)?;
        Ok(fs::read(path).await?)
    }

    async fn finish(&mut self) -> Result<(), BlobError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove staged upload {}: {e}", path.display());
                }
            }
        }
    }
}

/// Builds a collision-resistant file name from a client supplied name.
/// Only the sanitised stem of the client name is kept; the extension always
/// comes from the detected image format.
#[must_use]
pub fn unique_file_name(client_name: Option<&str>, extension: &str) -> String {
    let stem = client_name
        .map(|name| {
            let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
            let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
            stem.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .take(MAX_STEM_LEN)
                .collect::<String>()
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "photo".to_string());

    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    format!("{stem}_{suffix}.{extension}")
}

fn validate_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || key.starts_with(STAGING_DIR) {
        return Err(BlobError::InvalidKey);
    }

    let path = Path::new(key);
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(BlobError::InvalidKey);
    }

    Ok(())
}
