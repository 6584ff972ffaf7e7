use crate::server::response::ApiError;

const MAX_TITLE_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_TAG_LEN: usize = 100;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

fn is_valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    value.ok_or_else(|| ApiError::validation(field, REQUIRED))
}

/// Checks a title. Surrounding whitespace is trimmed before storing.
pub fn validate_title(title: Option<&str>) -> Result<String, ApiError> {
    let title = require("title", title)?.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title", BLANK));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation(
            "title",
            format!("Ensure this field has no more than {MAX_TITLE_LEN} characters."),
        ));
    }
    Ok(title.to_string())
}

pub fn validate_username(username: Option<&str>) -> Result<&str, ApiError> {
    let username = require("username", username)?;
    if username.is_empty() {
        return Err(ApiError::validation("username", BLANK));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(
            "username",
            format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
        ));
    }
    if !username.chars().all(is_valid_username_char) {
        return Err(ApiError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username)
}

pub fn validate_password(password: Option<&str>) -> Result<&str, ApiError> {
    let password = require("password", password)?;
    if password.is_empty() {
        return Err(ApiError::validation("password", BLANK));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    Ok(password)
}

pub fn validate_tags<'a, I>(tags: I) -> Result<(), ApiError>
where
    I: IntoIterator<Item = &'a String>,
{
    for tag in tags {
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ApiError::validation(
                "tags",
                format!("Tag names cannot exceed {MAX_TAG_LEN} characters."),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title(Some("  Trip ")).unwrap(), "Trip");
        assert_eq!(
            validate_title(None).unwrap_err().detail,
            json!({ "title": [REQUIRED] })
        );
        assert_eq!(
            validate_title(Some("   ")).unwrap_err().detail,
            json!({ "title": [BLANK] })
        );
        assert!(validate_title(Some("a".repeat(255).as_str())).is_ok());
        assert!(validate_title(Some("a".repeat(256).as_str())).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username(Some("alice.b+c@d-e_f")).is_ok());
        assert!(validate_username(Some("bad name")).is_err());
        assert!(validate_username(Some("")).is_err());
        assert!(validate_username(Some("a".repeat(151).as_str())).is_err());
        assert!(validate_username(None).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password(Some("password123")).is_ok());
        assert!(validate_password(Some("short")).is_err());
        assert!(validate_password(None).is_err());
    }

    #[test]
    fn test_validate_tags() {
        let ok = ["a".repeat(100)];
        let too_long = ["a".repeat(101)];
        assert!(validate_tags(&ok).is_ok());
        assert!(validate_tags(&too_long).is_err());
    }
}
