//! Data models
//!
//! `File` is the catalog entity; `UploadSpec` is raw caller input and `Limits` the
//! deployment bounds it is validated against.

mod file;
mod ids;
mod upload;

pub use file::{File, FileRecord};
pub use ids::{Checksum, FileId, IdempotencyKey, OwnerId, StorageRef, Tag};
pub use upload::{Limits, UploadSpec, ValidatedUpload};
