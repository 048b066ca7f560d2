//! Field-level validation
//!
//! Pure functions over raw strings. Each one either accepts its input or returns
//! `AppError::Invalid` naming the field and the first rule that failed. None of them
//! perform I/O.

use ulid::Ulid;

use crate::constants::{
    FILE_ID_LEN, IDEMPOTENCY_KEY_MAX_LEN, OWNER_ID_MAX_LEN, TAG_MAX_LEN,
};
use crate::error::{AppError, FieldName, Reason};

/// Validate a file identifier in canonical form (26 lowercase Crockford characters).
pub fn validate_file_id(s: &str) -> Result<(), AppError> {
    if s.len() != FILE_ID_LEN {
        return Err(AppError::invalid(FieldName::Id, Reason::BadFormat));
    }

    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(AppError::invalid(FieldName::Id, Reason::BadFormat));
    }

    // 26 base32 chars carry 130 bits; a leading digit above 7 overflows 128.
    if s.as_bytes()[0] > b'7' {
        return Err(AppError::invalid(FieldName::Id, Reason::BadFormat));
    }

    Ulid::from_string(&s.to_ascii_uppercase())
        .map_err(|_| AppError::invalid(FieldName::Id, Reason::BadFormat))?;

    Ok(())
}

/// Lower-case and trim an identifier, then validate it.
pub fn normalize_file_id(s: &str) -> Result<String, AppError> {
    let normalized = s.trim().to_ascii_lowercase();
    validate_file_id(&normalized)?;
    Ok(normalized)
}

/// Owner IDs are 1-34 bytes of printable ASCII without surrounding whitespace.
pub fn validate_owner_id(s: &str) -> Result<(), AppError> {
    if s.is_empty() {
        return Err(AppError::invalid(FieldName::OwnerId, Reason::Empty));
    }

    if s.len() > OWNER_ID_MAX_LEN {
        return Err(AppError::invalid(FieldName::OwnerId, Reason::TooLong));
    }

    if s.trim() != s {
        return Err(AppError::invalid(FieldName::OwnerId, Reason::InvalidChar));
    }

    if s.bytes().any(|b| !(0x20..=0x7e).contains(&b)) {
        return Err(AppError::invalid(FieldName::OwnerId, Reason::InvalidChar));
    }

    Ok(())
}

/// Checksums are 64 lowercase hex characters (hex-encoded SHA-256).
pub fn validate_checksum(s: &str) -> Result<(), AppError> {
    if s.len() != 64 {
        return Err(AppError::invalid(FieldName::Checksum, Reason::BadFormat));
    }

    if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(AppError::invalid(FieldName::Checksum, Reason::InvalidChar));
    }

    Ok(())
}

/// Tags are slugs: 1-32 chars, lowercase alphanumeric first, then alnum, `-` or `_`.
pub fn validate_tag(s: &str) -> Result<(), AppError> {
    if s.is_empty() {
        return Err(AppError::invalid(FieldName::Tags, Reason::Empty));
    }

    if s.len() > TAG_MAX_LEN {
        return Err(AppError::invalid(FieldName::Tags, Reason::TooLong));
    }

    let bytes = s.as_bytes();
    if !is_slug_start(bytes[0]) {
        return Err(AppError::invalid(FieldName::Tags, Reason::BadFormat));
    }

    if !bytes[1..]
        .iter()
        .all(|&b| is_slug_start(b) || b == b'-' || b == b'_')
    {
        return Err(AppError::invalid(FieldName::Tags, Reason::BadFormat));
    }

    Ok(())
}

fn is_slug_start(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

/// Check a display name and return it unchanged when acceptable.
///
/// Rejects NUL, CR, LF, TAB and path separators, names that are empty or only
/// whitespace, and names longer than `max_len` Unicode code points.
pub fn sanitize_name(name: &str, max_len: usize) -> Result<String, AppError> {
    if name
        .chars()
        .any(|c| matches!(c, '\0' | '\r' | '\n' | '\t' | '/' | '\\'))
    {
        return Err(AppError::invalid(FieldName::Name, Reason::InvalidChar));
    }

    if name.trim().is_empty() {
        return Err(AppError::invalid(FieldName::Name, Reason::Empty));
    }

    if name.chars().count() > max_len {
        return Err(AppError::invalid(FieldName::Name, Reason::TooLong));
    }

    Ok(name.to_string())
}

/// A content type is exactly one `type/subtype` token with no parameters.
pub fn validate_content_type(ct: &str) -> Result<(), AppError> {
    let bad = || AppError::invalid(FieldName::ContentType, Reason::BadFormat);

    let (main, sub) = ct.split_once('/').ok_or_else(bad)?;
    if main.is_empty() || sub.is_empty() || sub.contains('/') {
        return Err(bad());
    }

    if !main.bytes().chain(sub.bytes()).all(is_token_byte) {
        return Err(bad());
    }

    Ok(())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'!' | b'#' | b'$' | b'&' | b'^' | b'_' | b'.' | b'+' | b'-')
}

/// Trim an idempotency key and check it is 1-64 visible ASCII characters.
pub fn normalize_idempotency_key(raw: &str) -> Result<String, AppError> {
    let key = raw.trim();

    if key.is_empty() {
        return Err(AppError::invalid(FieldName::IdempotencyKey, Reason::Empty));
    }

    if key.len() > IDEMPOTENCY_KEY_MAX_LEN {
        return Err(AppError::invalid(
            FieldName::IdempotencyKey,
            Reason::TooLong,
        ));
    }

    if key.bytes().any(|b| !(0x21..=0x7e).contains(&b)) {
        return Err(AppError::invalid(
            FieldName::IdempotencyKey,
            Reason::InvalidChar,
        ));
    }

    Ok(key.to_string())
}

/// Storage refs are backend locators; they must never look like a path escape.
pub fn validate_storage_ref(s: &str) -> Result<(), AppError> {
    if s.is_empty() {
        return Err(AppError::invalid(FieldName::StorageRef, Reason::Empty));
    }

    if s.starts_with('/') || s.contains("..") || s.chars().any(char::is_whitespace) {
        return Err(AppError::invalid(FieldName::StorageRef, Reason::BadFormat));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_ID: &str = "01arz3ndektsv4rrffq69g5fav";

    #[test]
    fn file_id_accepts_canonical_ulid() {
        assert!(validate_file_id(GOOD_ID).is_ok());
    }

    #[test]
    fn file_id_rejects_wrong_length_and_case() {
        assert!(validate_file_id("01arz3nde").is_err());
        assert!(validate_file_id("01ARZ3NDEKTSV4RRFFQ69G5FAV").is_err());
        assert!(validate_file_id("81arz3ndektsv4rrffq69g5fav").is_err());
        assert!(validate_file_id("01arz3ndektsv4rrffq69g5fa!").is_err());
    }

    #[test]
    fn normalize_file_id_trims_and_lowercases() {
        let normalized = normalize_file_id("  01ARZ3NDEKTSV4RRFFQ69G5FAV \n").unwrap();
        assert_eq!(normalized, GOOD_ID);
    }

    #[test]
    fn owner_id_rules() {
        assert!(validate_owner_id("u1").is_ok());
        assert!(validate_owner_id("user with spaces inside").is_ok());
        assert!(validate_owner_id("").unwrap_err().is_invalid(FieldName::OwnerId, Reason::Empty));
        assert!(validate_owner_id(&"a".repeat(34)).is_ok());
        assert!(validate_owner_id(&"a".repeat(35))
            .unwrap_err()
            .is_invalid(FieldName::OwnerId, Reason::TooLong));
        assert!(validate_owner_id(" u1").is_err());
        assert!(validate_owner_id("u1 ").is_err());
        assert!(validate_owner_id("u\u{7f}").is_err());
        assert!(validate_owner_id("üser").is_err());
    }

    #[test]
    fn checksum_rules() {
        assert!(validate_checksum(&"a".repeat(64)).is_ok());
        assert!(validate_checksum(&"a".repeat(63)).is_err());
        assert!(validate_checksum(&"A".repeat(64))
            .unwrap_err()
            .is_invalid(FieldName::Checksum, Reason::InvalidChar));
        assert!(validate_checksum(&"g".repeat(64)).is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tag("report").is_ok());
        assert!(validate_tag("2024_q1-final").is_ok());
        assert!(validate_tag(&"t".repeat(32)).is_ok());
        assert!(validate_tag(&"t".repeat(33)).is_err());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("-leading").is_err());
        assert!(validate_tag("_leading").is_err());
        assert!(validate_tag("has space").is_err());
        assert!(validate_tag("Upper").is_err());
    }

    #[test]
    fn name_rejects_control_and_separator_chars() {
        for bad in ["a/b", "a\\b", "a\0b", "a\rb", "a\nb", "a\tb"] {
            let err = sanitize_name(bad, 255).unwrap_err();
            assert!(err.is_invalid(FieldName::Name, Reason::InvalidChar), "{bad:?}");
        }
    }

    #[test]
    fn name_rejects_blank_and_counts_code_points() {
        assert!(sanitize_name("   ", 255)
            .unwrap_err()
            .is_invalid(FieldName::Name, Reason::Empty));
        assert!(sanitize_name("", 255).is_err());
        // 4 code points, 8 bytes
        assert_eq!(sanitize_name("日本語x", 4).unwrap(), "日本語x");
        assert!(sanitize_name("日本語xy", 4)
            .unwrap_err()
            .is_invalid(FieldName::Name, Reason::TooLong));
    }

    #[test]
    fn content_type_rules() {
        for good in ["text/plain", "application/vnd.api+json", "image/svg+xml", "a/b"] {
            assert!(validate_content_type(good).is_ok(), "{good}");
        }
        for bad in [
            "textplain",
            "text/plain/extra",
            "/plain",
            "text/",
            "text/plain; charset=utf-8",
            "text/plain;",
            "text /plain",
            "text/pl@in",
            "",
        ] {
            assert!(validate_content_type(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn idempotency_key_rules() {
        assert_eq!(normalize_idempotency_key("  key-1 ").unwrap(), "key-1");
        assert!(normalize_idempotency_key("   ")
            .unwrap_err()
            .is_invalid(FieldName::IdempotencyKey, Reason::Empty));
        assert!(normalize_idempotency_key(&"k".repeat(64)).is_ok());
        assert!(normalize_idempotency_key(&"k".repeat(65)).is_err());
        assert!(normalize_idempotency_key("key 1")
            .unwrap_err()
            .is_invalid(FieldName::IdempotencyKey, Reason::InvalidChar));
    }

    #[test]
    fn storage_ref_rules() {
        assert!(validate_storage_ref("objects/01/01arz3ndektsv4rrffq69g5fav").is_ok());
        assert!(validate_storage_ref("").is_err());
        assert!(validate_storage_ref("/etc/passwd").is_err());
        assert!(validate_storage_ref("objects/../secret").is_err());
        assert!(validate_storage_ref("objects/a b").is_err());
    }
}
