pub mod access;
mod albums;
pub mod dto;
mod photos;
pub mod response;
mod router;
mod users;
pub mod validation;

pub use photos::UploadAdmission;
pub use router::{AppState, create_router};
