//! Catalog ports
//!
//! `Catalog` serves reads. All writes go through a `CatalogTransaction` obtained from a
//! `TransactionCoordinator`, usually via `run_atomic`.

use async_trait::async_trait;
use storedge_core::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use storedge_core::{AppError, File, FileId, IdempotencyKey, OwnerId, StorageRef, Tag};

use super::cursor::Cursor;

/// Result of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The key now maps to the candidate file.
    Claimed,
    /// The key already maps to another file.
    AlreadyClaimed(FileId),
}

/// Listing filters. Items are ordered by `(created_at, id)` ascending.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub owner_id: Option<OwnerId>,
    pub tag: Option<Tag>,
    /// Case-insensitive substring of the file name.
    pub query: Option<String>,
    /// 0 selects the default page size; larger values are capped.
    pub limit: u32,
    pub after: Option<Cursor>,
}

impl ListQuery {
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_LIST_LIMIT as usize,
            n => n.min(MAX_LIST_LIMIT) as usize,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<File>,
    /// Present only when more items follow.
    pub next_cursor: Option<String>,
}

impl Page {
    /// Build a page from up to `limit + 1` ordered items.
    pub fn from_overfetch(mut items: Vec<File>, limit: usize) -> Self {
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|last| Cursor::after(last).encode())
        } else {
            None
        };
        Page { items, next_cursor }
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get(&self, id: &FileId) -> Result<Option<File>, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<Page, AppError>;

    /// File claimed by `owner` under `key`, if any. Keys are scoped per owner.
    async fn find_idempotency_key(
        &self,
        owner: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<FileId>, AppError>;

    async fn file_exists_for_ref(&self, storage_ref: &StorageRef) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError>;
}

/// A unit of catalog writes that commits or rolls back as a whole.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait CatalogTransaction: Send {
    /// Insert a new file row. An existing row with the same id yields `Conflict`.
    async fn create(&mut self, file: &File) -> Result<(), AppError>;

    /// Remove a file row and any idempotency keys pointing at it.
    async fn delete(&mut self, id: &FileId) -> Result<bool, AppError>;

    /// Atomically map `(owner, key)` to `candidate` unless it is already mapped.
    async fn claim_idempotency_key(
        &mut self,
        owner: &OwnerId,
        key: &IdempotencyKey,
        candidate: &FileId,
    ) -> Result<Claim, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
