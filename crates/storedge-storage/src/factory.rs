#[cfg(feature = "storage-local")]
use crate::LocalObjectStore;
use crate::{MemoryObjectStore, ObjectStore, StorageBackend, StorageResult};
#[cfg(not(feature = "storage-local"))]
use crate::StorageError;
use std::sync::Arc;
use storedge_core::Config;

/// Create an object store based on configuration
pub async fn create_object_store(config: &Config) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let store = LocalObjectStore::new(&config.local_storage_path).await?;
            tracing::info!(path = %config.local_storage_path, "Using local object store");
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; objects are lost on exit");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
    }
}
