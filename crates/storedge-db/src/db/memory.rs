//! In-memory catalog
//!
//! Reads and transactions share one `tokio::sync::Mutex`. A transaction holds the
//! lock for its whole lifetime and works on a copy of the state that replaces the
//! original on commit, which makes transactions fully serialized. A task holding a
//! transaction must not read through the `Catalog` side of the same value.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use storedge_core::{AppError, File, FileId, IdempotencyKey, OwnerId, StorageRef};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::catalog::{Catalog, CatalogTransaction, Claim, ListQuery, Page, TransactionCoordinator};

#[derive(Debug, Clone, Default)]
struct CatalogState {
    files: HashMap<FileId, File>,
    keys: HashMap<(OwnerId, IdempotencyKey), FileId>,
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn file_count(&self) -> usize {
        self.state.lock().await.files.len()
    }
}

fn matches_query(file: &File, query: &ListQuery, needle: Option<&str>) -> bool {
    if let Some(owner) = &query.owner_id {
        if file.owner_id() != owner {
            return false;
        }
    }
    if let Some(tag) = &query.tag {
        if !file.has_tag(tag) {
            return false;
        }
    }
    if let Some(needle) = needle {
        if !file.name().to_lowercase().contains(needle) {
            return false;
        }
    }
    if let Some(cursor) = &query.after {
        if !cursor.precedes(file) {
            return false;
        }
    }
    true
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get(&self, id: &FileId) -> Result<Option<File>, AppError> {
        Ok(self.state.lock().await.files.get(id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page, AppError> {
        let limit = query.effective_limit();
        let needle = query
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let state = self.state.lock().await;
        let mut matching: Vec<&File> = state
            .files
            .values()
            .filter(|f| matches_query(f, query, needle.as_deref()))
            .collect();
        matching.sort_by(|a, b| (a.created_at(), a.id()).cmp(&(b.created_at(), b.id())));

        let items = matching.into_iter().take(limit + 1).cloned().collect();
        Ok(Page::from_overfetch(items, limit))
    }

    async fn find_idempotency_key(
        &self,
        owner: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<FileId>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .keys
            .get(&(owner.clone(), key.clone()))
            .cloned())
    }

    async fn file_exists_for_ref(&self, storage_ref: &StorageRef) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .files
            .values()
            .any(|f| f.storage_ref() == storage_ref))
    }
}

#[async_trait]
impl TransactionCoordinator for MemoryCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<CatalogState>,
    working: CatalogState,
}

#[async_trait]
impl CatalogTransaction for MemoryTransaction {
    async fn create(&mut self, file: &File) -> Result<(), AppError> {
        if self.working.files.contains_key(file.id()) {
            return Err(AppError::Conflict(format!(
                "File {} already exists",
                file.id()
            )));
        }
        if self
            .working
            .files
            .values()
            .any(|f| f.storage_ref() == file.storage_ref())
        {
            return Err(AppError::Conflict(format!(
                "Storage ref {} already in use",
                file.storage_ref()
            )));
        }
        self.working.files.insert(file.id().clone(), file.clone());
        Ok(())
    }

    async fn delete(&mut self, id: &FileId) -> Result<bool, AppError> {
        let removed = self.working.files.remove(id).is_some();
        if removed {
            self.working.keys.retain(|_, file_id| file_id != id);
        }
        Ok(removed)
    }

    async fn claim_idempotency_key(
        &mut self,
        owner: &OwnerId,
        key: &IdempotencyKey,
        candidate: &FileId,
    ) -> Result<Claim, AppError> {
        let scoped = (owner.clone(), key.clone());
        if let Some(existing) = self.working.keys.get(&scoped) {
            return Ok(Claim::AlreadyClaimed(existing.clone()));
        }
        if !self.working.files.contains_key(candidate) {
            return Err(AppError::Conflict(format!(
                "Cannot claim key for unknown file {}",
                candidate
            )));
        }
        self.working.keys.insert(scoped, candidate.clone());
        Ok(Claim::Claimed)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}
