use std::fmt::Write as _;

use rand::Rng;

const KEY_BYTES: usize = 20;
pub const KEY_LENGTH: usize = KEY_BYTES * 2;

/// Generates a session token key: 40 lowercase hex characters.
#[must_use]
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().fold(String::with_capacity(KEY_LENGTH), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Cheap format check so malformed keys never reach the store.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    key.len() == KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_format() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(is_valid_key(&key));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_is_valid_key_rejects() {
        assert!(!is_valid_key("short"));
        assert!(!is_valid_key(&"A".repeat(40)));
        assert!(!is_valid_key(&"g".repeat(40)));
        assert!(is_valid_key(&"0a".repeat(20)));
    }
}
