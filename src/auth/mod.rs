mod helpers;
mod middleware;
mod password;
mod token;

pub use helpers::{Credential, authenticate, extract_credential};
pub use middleware::{AuthError, RequireUser};
pub use password::CredentialHasher;
pub use token::{KEY_LENGTH, generate_key, is_valid_key};
