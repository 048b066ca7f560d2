#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use storedge_core::{
    AppError, Clock, FileId, Limits, StorageRef, SteppingClock, UlidGenerator, UploadSpec,
};
use storedge_db::{Catalog, CatalogTransaction, MemoryCatalog, TransactionCoordinator};
use storedge_services::{
    BroadcastEventPublisher, DeletionService, ListingService, RequestContext, RetrievalService,
    UploadService,
};
use storedge_storage::{
    ByteRange, MemoryObjectStore, ObjectReader, ObjectStore, StorageBackend, StorageResult,
    StoredObject, TempObject, TempRef, TempWriter,
};
use tokio::io::AsyncReadExt;

pub const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// Services wired to in-memory adapters that tests can inspect directly.
pub struct Harness {
    pub store: MemoryObjectStore,
    pub catalog: MemoryCatalog,
    pub events: BroadcastEventPublisher,
    pub uploads: UploadService,
    pub retrieval: RetrievalService,
    pub deletion: DeletionService,
    pub listing: ListingService,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Limits::default(), None)
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self::build(limits, None)
    }

    pub fn with_transactions(transactions: Arc<dyn TransactionCoordinator>) -> Self {
        Self::build(Limits::default(), Some(transactions))
    }

    fn build(limits: Limits, transactions: Option<Arc<dyn TransactionCoordinator>>) -> Self {
        let store = MemoryObjectStore::new();
        let catalog = MemoryCatalog::new();
        let events = BroadcastEventPublisher::new(64);
        let clock: Arc<dyn Clock> = Arc::new(SteppingClock::new(
            base_time(),
            chrono::Duration::milliseconds(1),
        ));

        let store_port: Arc<dyn ObjectStore> = Arc::new(store.clone());
        let catalog_port: Arc<dyn Catalog> = Arc::new(catalog.clone());
        let transactions =
            transactions.unwrap_or_else(|| Arc::new(catalog.clone()) as Arc<dyn TransactionCoordinator>);

        let uploads = UploadService::new(
            store_port.clone(),
            catalog_port.clone(),
            transactions.clone(),
            Arc::new(UlidGenerator::new()),
            clock.clone(),
            Arc::new(events.clone()),
            limits,
        );
        let retrieval = RetrievalService::new(catalog_port.clone(), store_port.clone());
        let deletion = DeletionService::new(
            catalog_port.clone(),
            transactions,
            store_port,
            clock,
            Arc::new(events.clone()),
        );
        let listing = ListingService::new(catalog_port);

        Self {
            store,
            catalog,
            events,
            uploads,
            retrieval,
            deletion,
            listing,
        }
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::new(Duration::from_secs(10))
}

pub fn spec(name: &str, size: i64, key: Option<&str>, tags: &[&str]) -> UploadSpec {
    UploadSpec {
        name: name.to_string(),
        size,
        content_type: "text/plain".to_string(),
        idempotency_key: key.map(str::to_string),
        owner_id: "u1".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub async fn read_all(mut reader: storedge_storage::ObjectBody) -> Vec<u8> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    out
}

/// Wait for a condition that a spawned task will make true.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Coordinator whose transactions can never begin.
pub struct UnavailableCoordinator;

#[async_trait]
impl TransactionCoordinator for UnavailableCoordinator {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        Err(AppError::Internal("catalog unavailable".to_string()))
    }
}

/// Coordinator whose `begin` never returns. Records that it was reached.
#[derive(Clone, Default)]
pub struct StalledCoordinator {
    pub entered: Arc<AtomicBool>,
}

#[async_trait]
impl TransactionCoordinator for StalledCoordinator {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, AppError> {
        self.entered.store(true, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Memory store that counts `open` calls.
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryObjectStore,
    pub opens: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn write_temp(
        &self,
        id: &FileId,
        content_type: &str,
    ) -> StorageResult<(TempWriter, TempRef)> {
        self.inner.write_temp(id, content_type).await
    }

    async fn commit(&self, temp: &TempRef) -> StorageResult<StorageRef> {
        self.inner.commit(temp).await
    }

    async fn open(
        &self,
        storage_ref: &StorageRef,
        range: Option<ByteRange>,
    ) -> StorageResult<ObjectReader> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(storage_ref, range).await
    }

    async fn stat(&self, storage_ref: &StorageRef) -> StorageResult<u64> {
        self.inner.stat(storage_ref).await
    }

    async fn delete_temp(&self, temp: &TempRef) -> StorageResult<()> {
        self.inner.delete_temp(temp).await
    }

    async fn delete(&self, storage_ref: &StorageRef) -> StorageResult<()> {
        self.inner.delete(storage_ref).await
    }

    async fn list_committed(&self) -> StorageResult<Vec<StoredObject>> {
        self.inner.list_committed().await
    }

    async fn list_temp(&self) -> StorageResult<Vec<TempObject>> {
        self.inner.list_temp().await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
