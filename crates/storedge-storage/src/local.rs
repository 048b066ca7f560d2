use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storedge_core::{FileId, StorageRef};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::keys::{object_key, temp_key, OBJECT_PREFIX, TEMP_PREFIX};
use crate::traits::{
    ByteRange, ObjectBody, ObjectReader, ObjectStore, StorageError, StorageResult, StoredObject, TempObject,
    TempRef, TempWriter,
};
use crate::StorageBackend;

/// Suffix of the sidecar file holding an object's content type.
const CONTENT_TYPE_EXT: &str = "ctype";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Local filesystem object store
///
/// Layout under `base_path`: `tmp/{id}` for staged objects and `objects/{shard}/{id}`
/// for committed ones, each with a `.ctype` sidecar. Commit is a same-filesystem
/// rename, so a committed object is never observed half-written.
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    /// Create a new LocalObjectStore rooted at `base_path`
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        for dir in [TEMP_PREFIX, OBJECT_PREFIX] {
            let path = base_path.join(dir);
            fs::create_dir_all(&path).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        Ok(LocalObjectStore { base_path })
    }

    /// Convert a storage key to a filesystem path, rejecting anything that could
    /// escape the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(self.base_path.join(relative))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_content_type(&self, path: &Path) -> String {
        match fs::read_to_string(sidecar_path(path)).await {
            Ok(ct) => ct.trim().to_string(),
            Err(_) => DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    /// Remove an object and its sidecar; missing files are not an error.
    async fn remove_object(&self, path: &Path) -> StorageResult<bool> {
        let removed = match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match fs::remove_file(sidecar_path(path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to delete content type sidecar"
                );
            }
        }

        Ok(removed)
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(CONTENT_TYPE_EXT);
    PathBuf::from(name)
}

fn is_sidecar(name: &str) -> bool {
    name.ends_with(&format!(".{}", CONTENT_TYPE_EXT))
}

fn modified_at(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn write_temp(
        &self,
        id: &FileId,
        content_type: &str,
    ) -> StorageResult<(TempWriter, TempRef)> {
        let key = temp_key(id);
        let path = self.key_to_path(&key)?;

        self.ensure_parent_dir(&path).await?;

        fs::write(sidecar_path(&path), content_type)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to write content type for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), key = %key, "Opened temp object");

        Ok((Box::pin(file), TempRef::new(id.clone(), key)))
    }

    async fn commit(&self, temp: &TempRef) -> StorageResult<StorageRef> {
        let from = self.key_to_path(temp.key())?;
        let key = object_key(temp.id());
        let to = self.key_to_path(&key)?;
        let start = Instant::now();

        let file = match fs::File::open(&from).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(temp.key().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        file.sync_all().await.map_err(|e| {
            StorageError::CommitFailed(format!("Failed to sync file {}: {}", from.display(), e))
        })?;
        drop(file);

        self.ensure_parent_dir(&to).await?;

        // Sidecar first so a visible object always has its content type.
        if let Err(e) = fs::rename(sidecar_path(&from), sidecar_path(&to)).await {
            if e.kind() != ErrorKind::NotFound {
                return Err(StorageError::CommitFailed(format!(
                    "Failed to move content type for {}: {}",
                    from.display(),
                    e
                )));
            }
        }

        fs::rename(&from, &to).await.map_err(|e| {
            StorageError::CommitFailed(format!(
                "Failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;

        let size = fs::metadata(&to).await.map(|m| m.len()).unwrap_or(0);

        tracing::info!(
            path = %to.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage commit successful"
        );

        StorageRef::parse(&key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    async fn open(
        &self,
        storage_ref: &StorageRef,
        range: Option<ByteRange>,
    ) -> StorageResult<ObjectReader> {
        let path = self.key_to_path(storage_ref.as_str())?;

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_ref.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let size = file.metadata().await?.len();
        let content_type = self.read_content_type(&path).await;

        let (reader, len) = match range {
            Some(range) => {
                if !range.fits(size) {
                    return Err(StorageError::InvalidRange(format!(
                        "{}-{} outside object of {} bytes",
                        range.start, range.end, size
                    )));
                }
                file.seek(SeekFrom::Start(range.start)).await?;
                let len = range.byte_count();
                let body: ObjectBody = Box::pin(file.take(len));
                (body, len)
            }
            None => {
                let body: ObjectBody = Box::pin(file);
                (body, size)
            }
        };

        tracing::debug!(
            path = %path.display(),
            key = %storage_ref,
            len = len,
            "Opened committed object"
        );

        Ok(ObjectReader {
            reader,
            len,
            content_type,
        })
    }

    async fn stat(&self, storage_ref: &StorageRef) -> StorageResult<u64> {
        let path = self.key_to_path(storage_ref.as_str())?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_ref.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete_temp(&self, temp: &TempRef) -> StorageResult<()> {
        let path = self.key_to_path(temp.key())?;
        if self.remove_object(&path).await? {
            tracing::debug!(path = %path.display(), key = %temp, "Deleted temp object");
        }
        Ok(())
    }

    async fn delete(&self, storage_ref: &StorageRef) -> StorageResult<()> {
        let path = self.key_to_path(storage_ref.as_str())?;
        let start = Instant::now();

        if self.remove_object(&path).await? {
            tracing::info!(
                path = %path.display(),
                key = %storage_ref,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage delete successful"
            );
        }

        Ok(())
    }

    async fn list_committed(&self) -> StorageResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut shards = fs::read_dir(self.base_path.join(OBJECT_PREFIX)).await?;

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().into_owned();
            let mut entries = fs::read_dir(shard.path()).await?;

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_sidecar(&name) || FileId::parse(&name).is_err() {
                    continue;
                }
                let key = format!("{}/{}/{}", OBJECT_PREFIX, shard_name, name);
                let Ok(storage_ref) = StorageRef::parse(&key) else {
                    continue;
                };
                let meta = entry.metadata().await?;
                objects.push(StoredObject {
                    storage_ref,
                    size: meta.len(),
                    modified_at: modified_at(&meta),
                });
            }
        }

        Ok(objects)
    }

    async fn list_temp(&self) -> StorageResult<Vec<TempObject>> {
        let mut objects = Vec::new();
        let mut entries = fs::read_dir(self.base_path.join(TEMP_PREFIX)).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_sidecar(&name) {
                continue;
            }
            let Ok(id) = FileId::parse(&name) else {
                tracing::debug!(name = %name, "Skipping unrecognised temp entry");
                continue;
            };
            let meta = entry.metadata().await?;
            let key = temp_key(&id);
            objects.push(TempObject {
                temp_ref: TempRef::new(id, key),
                modified_at: modified_at(&meta),
            });
        }

        Ok(objects)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
