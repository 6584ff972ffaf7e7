//! Photo bytes: upload admission, thumbnail rendering and blob storage.

mod storage;
pub mod thumbnail;
mod upload;

pub use storage::{BlobError, BlobStore, StagedFile, unique_file_name};
pub use upload::{DEFAULT_MAX_UPLOAD_BYTES, UploadLimit, UploadTooLarge};
