//! StorEdge Core Library
//!
//! This crate provides the domain model, field validators, error taxonomy,
//! configuration, and identity/clock providers shared by all StorEdge components.

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, FieldName, LogLevel, Reason};
pub use identity::{Clock, FixedClock, IdGenerator, SteppingClock, SystemClock, UlidGenerator};
pub use models::{
    Checksum, File, FileId, FileRecord, IdempotencyKey, Limits, OwnerId, StorageRef, Tag,
    UploadSpec, ValidatedUpload,
};
pub use storage_types::{CatalogBackend, StorageBackend};
