//! Object store abstraction
//!
//! This module defines the `ObjectStore` trait that all storage backends implement,
//! along with the handles it hands out for staged writes and reads.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storedge_core::{AppError, FieldName, FileId, Reason, StorageBackend, StorageRef};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object {} not found", key)),
            StorageError::InvalidRange(_) => AppError::invalid(FieldName::Range, Reason::InvalidRange),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Sink for staged upload bytes. Callers must `shutdown()` it before committing.
pub type TempWriter = Pin<Box<dyn AsyncWrite + Send + Unpin>>;

/// Byte stream of a committed object.
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Handle to a staged, not yet committed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempRef {
    id: FileId,
    key: String,
}

impl TempRef {
    pub(crate) fn new(id: FileId, key: String) -> Self {
        Self { id, key }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for TempRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Inclusive byte range `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// True when the range lies entirely inside an object of `size` bytes.
    pub fn fits(&self, size: u64) -> bool {
        self.start <= self.end && self.end < size
    }
}

/// An open committed object.
pub struct ObjectReader {
    pub reader: ObjectBody,
    /// Number of bytes `reader` yields.
    pub len: u64,
    pub content_type: String,
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("len", &self.len)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Listing entry for a committed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub storage_ref: StorageRef,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Listing entry for a staged object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempObject {
    pub temp_ref: TempRef,
    pub modified_at: DateTime<Utc>,
}

/// Object store abstraction
///
/// A staged write goes `write_temp` -> write + shutdown -> `commit`. Commit is atomic:
/// the object is either fully visible under its `StorageRef` or not at all. Deletes are
/// idempotent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a temp write target for `id`.
    async fn write_temp(&self, id: &FileId, content_type: &str)
        -> StorageResult<(TempWriter, TempRef)>;

    /// Promote a closed temp object to a permanent one.
    async fn commit(&self, temp: &TempRef) -> StorageResult<StorageRef>;

    /// Read a committed object, optionally restricted to `range`.
    async fn open(
        &self,
        storage_ref: &StorageRef,
        range: Option<ByteRange>,
    ) -> StorageResult<ObjectReader>;

    /// Size of a committed object in bytes.
    async fn stat(&self, storage_ref: &StorageRef) -> StorageResult<u64>;

    async fn delete_temp(&self, temp: &TempRef) -> StorageResult<()>;

    async fn delete(&self, storage_ref: &StorageRef) -> StorageResult<()>;

    async fn list_committed(&self) -> StorageResult<Vec<StoredObject>>;

    async fn list_temp(&self) -> StorageResult<Vec<TempObject>>;

    fn backend_type(&self) -> StorageBackend;
}
