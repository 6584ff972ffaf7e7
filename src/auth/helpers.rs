use super::{CredentialHasher, is_valid_key};
use crate::store::Store;
use crate::types::User;

#[derive(Debug)]
pub enum CredentialError {
    InvalidScheme,
    Malformed,
}

#[derive(Debug)]
pub enum AuthenticationError {
    InvalidToken,
    InvalidCredentials,
    InternalError,
}

/// A credential presented in the Authorization header.
#[derive(Debug, PartialEq, Eq)]
pub enum Credential {
    Token(String),
    Password { username: String, password: String },
}

/// Decodes a Basic auth header into username and password.
/// Expects format: Basic base64(username:password)
pub fn extract_basic_credentials(header: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;

    Some((username.to_string(), password.to_string()))
}

/// Extracts a credential from the Authorization header.
/// Accepts `Bearer <key>`, the legacy `Token <key>` and Basic auth.
/// Returns None if no auth header is present.
pub fn extract_credential(
    auth_header: Option<&str>,
) -> Result<Option<Credential>, CredentialError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    if let Some(key) = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
    {
        let key = key.trim();
        if key.is_empty() {
            return Err(CredentialError::Malformed);
        }
        return Ok(Some(Credential::Token(key.to_string())));
    }

    if header.starts_with("Basic ") {
        return extract_basic_credentials(header)
            .map(|(username, password)| Some(Credential::Password { username, password }))
            .ok_or(CredentialError::Malformed);
    }

    Err(CredentialError::InvalidScheme)
}

/// Resolves a credential to the user it belongs to.
///
/// Password checks run on the blocking pool.
pub async fn authenticate(
    store: &dyn Store,
    credential: &Credential,
) -> Result<User, AuthenticationError> {
    match credential {
        Credential::Token(key) => {
            if !is_valid_key(key) {
                return Err(AuthenticationError::InvalidToken);
            }
            store
                .get_user_by_token(key)
                .map_err(|e| {
                    tracing::error!("Token lookup failed: {e}");
                    AuthenticationError::InternalError
                })?
                .ok_or(AuthenticationError::InvalidToken)
        }
        Credential::Password { username, password } => {
            let user = store
                .get_user_by_username(username)
                .map_err(|e| {
                    tracing::error!("User lookup failed: {e}");
                    AuthenticationError::InternalError
                })?
                .ok_or(AuthenticationError::InvalidCredentials)?;

            let valid =
                CredentialHasher::verify_blocking(password.clone(), user.password_hash.clone())
                    .await
                    .map_err(|e| {
                        tracing::error!("Password verification failed: {e}");
                        AuthenticationError::InternalError
                    })?;
            if !valid {
                return Err(AuthenticationError::InvalidCredentials);
            }

            Ok(user)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_extract_bearer() {
        let credential = extract_credential(Some("Bearer abc123")).unwrap();
        assert_eq!(credential, Some(Credential::Token("abc123".to_string())));
    }

    #[test]
    fn test_extract_legacy_token_scheme() {
        let credential = extract_credential(Some("Token abc123")).unwrap();
        assert_eq!(credential, Some(Credential::Token("abc123".to_string())));
    }

    #[test]
    fn test_extract_basic() {
        let header = format!("Basic {}", STANDARD.encode("alice:pass:word"));
        let credential = extract_credential(Some(&header)).unwrap();
        assert_eq!(
            credential,
            Some(Credential::Password {
                username: "alice".to_string(),
                password: "pass:word".to_string(),
            })
        );
    }

    #[test]
    fn test_extract_missing_header() {
        assert!(extract_credential(None).unwrap().is_none());
    }

    #[test]
    fn test_extract_unknown_scheme() {
        assert!(matches!(
            extract_credential(Some("Digest foo")),
            Err(CredentialError::InvalidScheme)
        ));
    }

    #[test]
    fn test_extract_malformed() {
        assert!(matches!(
            extract_credential(Some("Bearer  ")),
            Err(CredentialError::Malformed)
        ));
        assert!(matches!(
            extract_credential(Some("Basic not-base64!")),
            Err(CredentialError::Malformed)
        ));
    }
}
