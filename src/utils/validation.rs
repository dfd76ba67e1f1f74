use crate::error::AppError;
use crate::models::comment::CommentPayload;
use crate::models::thread::{ContentPayload, ThreadPayload};
use crate::models::user::Credentials;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_LEN: usize = 35;

/// Request bodies that know how to check themselves.
///
/// `ValidJson` calls this right after deserializing, so by the time a handler sees a
/// payload it is already known-good and no store call has happened yet.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Letters, digits, underscores and hyphens.
fn username_re() -> &'static Regex {
    // Compiled once; the pattern is a literal so this can't fail at runtime.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap())
}

/// Usernames: 3 to 20 characters, `[a-zA-Z0-9_-]` only.
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err("username must be between 3 and 20 characters long".to_string());
    }
    if !username_re().is_match(username) {
        return Err(
            "username can only contain letters, numbers, underscores, and hyphens".to_string(),
        );
    }
    Ok(())
}

/// Passwords only have a floor. Long passphrases are welcome.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("password must be at least 8 characters long".to_string());
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    let len = title.chars().count();
    if !(1..=255).contains(&len) {
        return Err("title must be between 1 and 255 characters long".to_string());
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), String> {
    if content.is_empty() {
        return Err("content must be at least 1 character long".to_string());
    }
    Ok(())
}

/// At most five tags, each 1 to 35 characters of any kind (not all blank), no repeats.
///
/// Used both for thread bodies and for the `tags` filter on the listing, so you can't
/// filter by a tag that could never have been stored.
pub fn validate_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > MAX_TAGS {
        return Err(format!("there can be at most {MAX_TAGS} tags"));
    }
    for (i, tag) in tags.iter().enumerate() {
        let len = tag.chars().count();
        if !(1..=MAX_TAG_LEN).contains(&len) || tag.trim().is_empty() {
            return Err(format!(
                "each tag must be between 1 and {MAX_TAG_LEN} characters long"
            ));
        }
        if tags[..i].contains(tag) {
            return Err(format!("duplicate tag: {tag}"));
        }
    }
    Ok(())
}

/// Splits the `tags` CSV query value. Empty or missing means "no filter".
pub fn parse_tag_filter(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let tags: Vec<String> = match raw.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(csv) => csv.split(',').map(|t| t.trim().to_string()).collect(),
    };
    validate_tags(&tags).map_err(AppError::Validation)?;
    Ok(tags)
}

/// Numeric resource ids from the path or query string.
pub fn parse_resource_id(raw: &str, resource: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("Invalid {resource} ID")))
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

impl Validate for ThreadPayload {
    fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        validate_content(&self.content)?;
        validate_tags(&self.tags)
    }
}

impl Validate for ContentPayload {
    fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

impl Validate for CommentPayload {
    fn validate(&self) -> Result<(), String> {
        validate_content(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("alice")]
    #[case("al_")]
    #[case("bob-the-builder_2024")]
    fn accepts_good_usernames(#[case] name: &str) {
        assert!(validate_username(name).is_ok());
    }

    #[rstest]
    #[case("al")]
    #[case("this_name_is_way_too_long")]
    #[case("alice!")]
    #[case("al ice")]
    #[case("")]
    fn rejects_bad_usernames(#[case] name: &str) {
        assert!(validate_username(name).is_err());
    }

    #[test]
    fn password_needs_eight_characters() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn title_bounds() {
        assert!(validate_title("").is_err());
        assert!(validate_title(&"a".repeat(255)).is_ok());
        assert!(validate_title(&"a".repeat(256)).is_err());
    }

    #[test]
    fn tags_are_limited_to_five() {
        let tags: Vec<String> = (0..6).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&tags).is_err());
        assert!(validate_tags(&tags[..5]).is_ok());
    }

    #[rstest]
    #[case("c++")]
    #[case("machine learning")]
    #[case("日本語")]
    #[case("a-tag-that-is-exactly-35-chars-long")]
    fn free_form_tags_are_accepted(#[case] tag: &str) {
        assert!(validate_tags(&[tag.to_string()]).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("this-tag-is-thirty-six-characters-xx")]
    fn empty_blank_or_long_tags_are_rejected(#[case] tag: &str) {
        assert_eq!(
            validate_tags(&[tag.to_string()]).unwrap_err(),
            "each tag must be between 1 and 35 characters long"
        );
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let tags = vec!["rust".to_string(), "rust".to_string()];
        assert_eq!(validate_tags(&tags).unwrap_err(), "duplicate tag: rust");
    }

    #[test]
    fn tag_filter_parsing() {
        assert!(parse_tag_filter(None).unwrap().is_empty());
        assert!(parse_tag_filter(Some("")).unwrap().is_empty());
        assert_eq!(parse_tag_filter(Some("rust, web")).unwrap(), vec!["rust", "web"]);
        assert_eq!(
            parse_tag_filter(Some("c++,machine learning")).unwrap(),
            vec!["c++", "machine learning"]
        );
        assert!(parse_tag_filter(Some("rust,,web")).is_err());
        assert!(parse_tag_filter(Some("a,b,c,d,e,f")).is_err());
    }

    #[test]
    fn resource_ids_must_be_integers() {
        assert_eq!(parse_resource_id("42", "thread").unwrap(), 42);
        match parse_resource_id("forty-two", "thread") {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Invalid thread ID"),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
