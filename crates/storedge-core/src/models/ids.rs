//! Validated identifier newtypes
//!
//! Every type here can only be built through a validating constructor, so holding one
//! is proof that the wrapped string passed its field rules. Serde goes through the
//! same constructors.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::AppError;
use crate::validation::fields::{
    normalize_file_id, normalize_idempotency_key, validate_checksum, validate_owner_id,
    validate_storage_ref, validate_tag,
};

macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = AppError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value)
            }
        }
    };
}

/// File identifier: a ULID in canonical lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Trim, lower-case and validate.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        normalize_file_id(raw).map(FileId)
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        FileId(ulid.to_string().to_ascii_lowercase())
    }
}

string_newtype!(FileId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        validate_owner_id(raw)?;
        Ok(OwnerId(raw.to_string()))
    }
}

string_newtype!(OwnerId);

/// Hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        validate_checksum(raw)?;
        Ok(Checksum(raw.to_string()))
    }
}

string_newtype!(Checksum);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        validate_tag(raw)?;
        Ok(Tag(raw.to_string()))
    }
}

string_newtype!(Tag);

/// Caller-supplied deduplication key. Surrounding whitespace is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        normalize_idempotency_key(raw).map(IdempotencyKey)
    }
}

string_newtype!(IdempotencyKey);

/// Opaque backend locator for a committed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageRef(String);

impl StorageRef {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        validate_storage_ref(raw)?;
        Ok(StorageRef(raw.to_string()))
    }
}

string_newtype!(StorageRef);
