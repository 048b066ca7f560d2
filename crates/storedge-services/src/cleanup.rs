//! Compensation for objects written by requests that did not finish.
//!
//! Removal runs outside the request context with its own timeout. An object that
//! cannot be removed is logged as an orphan and left for the sweeper.

use std::sync::Arc;
use std::time::Duration;

use storedge_core::constants::CLEANUP_TIMEOUT_SECS;
use storedge_core::StorageRef;
use storedge_storage::{ObjectStore, TempRef};

#[derive(Debug, Clone)]
pub(crate) enum PendingObject {
    Temp(TempRef),
    Committed(StorageRef),
}

impl PendingObject {
    fn describe(&self) -> String {
        match self {
            PendingObject::Temp(temp) => temp.key().to_string(),
            PendingObject::Committed(storage_ref) => storage_ref.to_string(),
        }
    }
}

/// Delete `object`, bounded by the cleanup timeout. Returns whether it is gone.
pub(crate) async fn remove_object(store: &dyn ObjectStore, object: &PendingObject) -> bool {
    let removal = async {
        match object {
            PendingObject::Temp(temp) => store.delete_temp(temp).await,
            PendingObject::Committed(storage_ref) => store.delete(storage_ref).await,
        }
    };

    match tokio::time::timeout(Duration::from_secs(CLEANUP_TIMEOUT_SECS), removal).await {
        Ok(Ok(())) => {
            tracing::debug!(object = %object.describe(), "Removed object");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(
                error = %e,
                object = %object.describe(),
                "Failed to remove object, leaving orphan"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                object = %object.describe(),
                timeout_secs = CLEANUP_TIMEOUT_SECS,
                "Timed out removing object, leaving orphan"
            );
            false
        }
    }
}

/// Tracks the object an in-flight upload has written so far.
///
/// Call [`CleanupGuard::cleanup`] on failure or [`CleanupGuard::disarm`] on success.
/// If the guard is dropped while still armed (the upload future was dropped), the
/// removal is spawned on the current runtime. After
/// [`CleanupGuard::enter_transaction`] a dropped guard removes nothing: the catalog
/// commit may already have applied, so the object is left for the sweeper, which
/// only deletes objects no row references.
pub(crate) struct CleanupGuard {
    store: Arc<dyn ObjectStore>,
    pending: Option<PendingObject>,
    in_transaction: bool,
}

impl CleanupGuard {
    pub(crate) fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            pending: None,
            in_transaction: false,
        }
    }

    pub(crate) fn track_temp(&mut self, temp: TempRef) {
        self.pending = Some(PendingObject::Temp(temp));
    }

    /// The temp object became `storage_ref`; only the committed object needs removal now.
    pub(crate) fn track_committed(&mut self, storage_ref: StorageRef) {
        self.pending = Some(PendingObject::Committed(storage_ref));
    }

    /// The catalog transaction for the tracked object is about to begin.
    pub(crate) fn enter_transaction(&mut self) {
        self.in_transaction = true;
    }

    pub(crate) fn disarm(&mut self) {
        self.pending = None;
    }

    pub(crate) async fn cleanup(&mut self) -> bool {
        let Some(object) = self.pending.clone() else {
            return true;
        };
        let removed = remove_object(self.store.as_ref(), &object).await;
        self.pending = None;
        removed
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let Some(object) = self.pending.take() else {
            return;
        };

        if self.in_transaction {
            tracing::warn!(
                object = %object.describe(),
                "Upload dropped during catalog transaction, leaving object for the sweeper"
            );
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                tracing::debug!(object = %object.describe(), "Upload dropped, scheduling cleanup");
                handle.spawn(async move {
                    remove_object(store.as_ref(), &object).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    object = %object.describe(),
                    "Upload dropped outside a runtime, leaving orphan"
                );
            }
        }
    }
}
