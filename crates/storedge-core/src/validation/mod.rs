//! Validation modules

pub mod fields;

pub use fields::{
    normalize_file_id, normalize_idempotency_key, sanitize_name, validate_checksum,
    validate_content_type, validate_file_id, validate_owner_id, validate_storage_ref,
    validate_tag,
};
