use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 19 * 1024; // 19MB
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Hashes and verifies user passwords with Argon2id.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hashes a password into a PHC string with an embedded salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(format!("failed to hash password: {e}")))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::PasswordHash(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::PasswordHash(format!("failed to verify password: {e}"))),
        }
    }

    /// Runs [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(password: String) -> Result<String> {
        tokio::task::spawn_blocking(move || Self::new().hash(&password))
            .await
            .map_err(|e| Error::PasswordHash(format!("hashing task failed: {e}")))?
    }

    /// Runs [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(password: String, hash: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || Self::new().verify(&password, &hash))
            .await
            .map_err(|e| Error::PasswordHash(format!("verification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_correct_password() {
        let hasher = CredentialHasher::new();
        let hash = hasher.hash("password123").unwrap();

        assert!(hasher.verify("password123", &hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = CredentialHasher::new();
        let hash = hasher.hash("password123").unwrap();

        assert!(!hasher.verify("password124", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted_phc() {
        let hasher = CredentialHasher::new();
        let first = hasher.hash("password123").unwrap();
        let second = hasher.hash("password123").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_garbage_hash() {
        let hasher = CredentialHasher::new();
        assert!(hasher.verify("password123", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_blocking_variants_agree() {
        let hash = CredentialHasher::hash_blocking("password123".to_string())
            .await
            .unwrap();

        assert!(
            CredentialHasher::verify_blocking("password123".to_string(), hash.clone())
                .await
                .unwrap()
        );
        assert!(
            !CredentialHasher::verify_blocking("wrongpassword".to_string(), hash)
                .await
                .unwrap()
        );
    }
}
