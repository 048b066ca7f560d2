//! In-memory object store for tests and development.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use storedge_core::{Clock, FileId, StorageRef, SystemClock};
use tokio::io::AsyncWrite;

use crate::keys::{object_key, temp_key};
use crate::traits::{
    ByteRange, ObjectBody, ObjectReader, ObjectStore, StorageError, StorageResult, StoredObject,
    TempObject, TempRef, TempWriter,
};
use crate::StorageBackend;

struct StagedObject {
    id: FileId,
    data: Vec<u8>,
    content_type: String,
    modified_at: DateTime<Utc>,
}

struct CommittedObject {
    data: Bytes,
    content_type: String,
    modified_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    temp: HashMap<String, StagedObject>,
    committed: HashMap<String, CommittedObject>,
}

/// Object store backed by process memory.
///
/// Same key layout and commit semantics as the filesystem store. Timestamps come from
/// the injected clock so age-based sweeps can be tested deterministically.
#[derive(Clone)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    fail_deletes: Arc<AtomicBool>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
            fail_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every `delete`/`delete_temp` fail until switched off again.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn committed_count(&self) -> usize {
        lock(&self.state).committed.len()
    }

    pub fn temp_count(&self) -> usize {
        lock(&self.state).temp.len()
    }

    fn check_delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "Injected delete failure for {}",
                key
            )));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Appends written bytes to a staged object.
struct MemoryTempWriter {
    state: Arc<Mutex<State>>,
    key: String,
}

impl AsyncWrite for MemoryTempWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = lock(&self.state);
        match state.temp.get_mut(&self.key) {
            Some(staged) => {
                staged.data.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("temp object {} no longer exists", self.key),
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn write_temp(
        &self,
        id: &FileId,
        content_type: &str,
    ) -> StorageResult<(TempWriter, TempRef)> {
        let key = temp_key(id);
        lock(&self.state).temp.insert(
            key.clone(),
            StagedObject {
                id: id.clone(),
                data: Vec::new(),
                content_type: content_type.to_string(),
                modified_at: self.clock.now(),
            },
        );

        let writer = MemoryTempWriter {
            state: self.state.clone(),
            key: key.clone(),
        };
        Ok((Box::pin(writer), TempRef::new(id.clone(), key)))
    }

    async fn commit(&self, temp: &TempRef) -> StorageResult<StorageRef> {
        let key = object_key(temp.id());
        let storage_ref =
            StorageRef::parse(&key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;

        let mut state = lock(&self.state);
        let staged = state
            .temp
            .remove(temp.key())
            .ok_or_else(|| StorageError::NotFound(temp.key().to_string()))?;

        state.committed.insert(
            key,
            CommittedObject {
                data: Bytes::from(staged.data),
                content_type: staged.content_type,
                modified_at: self.clock.now(),
            },
        );

        Ok(storage_ref)
    }

    async fn open(
        &self,
        storage_ref: &StorageRef,
        range: Option<ByteRange>,
    ) -> StorageResult<ObjectReader> {
        let state = lock(&self.state);
        let object = state
            .committed
            .get(storage_ref.as_str())
            .ok_or_else(|| StorageError::NotFound(storage_ref.to_string()))?;

        let size = object.data.len() as u64;
        let data = match range {
            Some(range) => {
                if !range.fits(size) {
                    return Err(StorageError::InvalidRange(format!(
                        "{}-{} outside object of {} bytes",
                        range.start, range.end, size
                    )));
                }
                object
                    .data
                    .slice(range.start as usize..=range.end as usize)
            }
            None => object.data.clone(),
        };

        let len = data.len() as u64;
        let reader: ObjectBody = Box::pin(io::Cursor::new(data));
        Ok(ObjectReader {
            reader,
            len,
            content_type: object.content_type.clone(),
        })
    }

    async fn stat(&self, storage_ref: &StorageRef) -> StorageResult<u64> {
        lock(&self.state)
            .committed
            .get(storage_ref.as_str())
            .map(|o| o.data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(storage_ref.to_string()))
    }

    async fn delete_temp(&self, temp: &TempRef) -> StorageResult<()> {
        self.check_delete(temp.key())?;
        lock(&self.state).temp.remove(temp.key());
        Ok(())
    }

    async fn delete(&self, storage_ref: &StorageRef) -> StorageResult<()> {
        self.check_delete(storage_ref.as_str())?;
        lock(&self.state).committed.remove(storage_ref.as_str());
        Ok(())
    }

    async fn list_committed(&self) -> StorageResult<Vec<StoredObject>> {
        let state = lock(&self.state);
        let mut objects = Vec::with_capacity(state.committed.len());
        for (key, object) in &state.committed {
            let storage_ref =
                StorageRef::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
            objects.push(StoredObject {
                storage_ref,
                size: object.data.len() as u64,
                modified_at: object.modified_at,
            });
        }
        Ok(objects)
    }

    async fn list_temp(&self) -> StorageResult<Vec<TempObject>> {
        let state = lock(&self.state);
        Ok(state
            .temp
            .iter()
            .map(|(key, staged)| TempObject {
                temp_ref: TempRef::new(staged.id.clone(), key.clone()),
                modified_at: staged.modified_at,
            })
            .collect())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
