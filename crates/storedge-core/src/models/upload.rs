use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_NAME_LEN, DEFAULT_MAX_TAGS_PER_FILE, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::{AppError, FieldName, Reason};
use crate::validation::fields::{sanitize_name, validate_content_type};

use super::ids::{IdempotencyKey, OwnerId, Tag};

/// Deployment-wide upload limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_upload_bytes: i64,
    pub max_tags_per_file: usize,
    /// Measured in Unicode code points.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_tags_per_file: DEFAULT_MAX_TAGS_PER_FILE,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

/// Upload request as received from a caller, before any checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadSpec {
    pub name: String,
    /// Declared size in bytes; the streamed body must match it exactly.
    pub size: i64,
    pub content_type: String,
    pub idempotency_key: Option<String>,
    pub owner_id: String,
    pub tags: Vec<String>,
}

/// An `UploadSpec` that passed validation, with typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub idempotency_key: Option<IdempotencyKey>,
    pub owner_id: OwnerId,
    /// Duplicates removed, first occurrence kept.
    pub tags: Vec<Tag>,
}

impl UploadSpec {
    /// Check every field against `limits`, stopping at the first failure.
    pub fn validate(&self, limits: &Limits) -> Result<ValidatedUpload, AppError> {
        let name = sanitize_name(&self.name, limits.max_name_len)?;

        if self.size <= 0 {
            return Err(AppError::invalid(FieldName::Size, Reason::TooSmall));
        }
        if self.size > limits.max_upload_bytes {
            return Err(AppError::TooLarge {
                limit: limits.max_upload_bytes as u64,
            });
        }

        validate_content_type(&self.content_type)?;

        let owner_id = OwnerId::parse(&self.owner_id)?;

        if self.tags.len() > limits.max_tags_per_file {
            return Err(AppError::invalid(FieldName::Tags, Reason::ExceedsLimit));
        }
        let mut tags: Vec<Tag> = Vec::with_capacity(self.tags.len());
        for raw in &self.tags {
            let tag = Tag::parse(raw)?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let idempotency_key = self
            .idempotency_key
            .as_deref()
            .map(IdempotencyKey::parse)
            .transpose()?;

        Ok(ValidatedUpload {
            name,
            size: self.size as u64,
            content_type: self.content_type.clone(),
            idempotency_key,
            owner_id,
            tags,
        })
    }
}
