//! Orphan sweep
//!
//! Removes committed objects that no catalog row references and temp objects left
//! by uploads that never finished. Only objects older than the grace period are
//! touched, so uploads still in flight are never disturbed. Scheduling is up to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storedge_core::{AppError, Clock};
use storedge_db::Catalog;
use storedge_storage::ObjectStore;

use crate::cleanup::{remove_object, PendingObject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Objects old enough to be considered.
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OrphanSweeper {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    grace_period: Duration,
}

impl OrphanSweeper {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        grace_period: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            grace_period,
        }
    }

    #[tracing::instrument(skip(self), fields(cleanup.operation = "orphan_sweep"))]
    pub async fn sweep_once(&self) -> Result<SweepReport, AppError> {
        let grace = chrono::Duration::from_std(self.grace_period)
            .map_err(|e| AppError::Internal(format!("Invalid grace period: {}", e)))?;
        let cutoff = self.clock.now() - grace;
        let mut report = SweepReport::default();

        for object in self.store.list_committed().await? {
            if !is_stale(object.modified_at, cutoff) {
                continue;
            }
            report.scanned += 1;

            if self.catalog.file_exists_for_ref(&object.storage_ref).await? {
                continue;
            }

            tracing::info!(
                storage_ref = %object.storage_ref,
                size = object.size,
                modified_at = %object.modified_at,
                "Deleting unreferenced object"
            );
            self.remove(PendingObject::Committed(object.storage_ref), &mut report)
                .await;
        }

        for object in self.store.list_temp().await? {
            if !is_stale(object.modified_at, cutoff) {
                continue;
            }
            report.scanned += 1;

            tracing::info!(
                temp = %object.temp_ref,
                modified_at = %object.modified_at,
                "Deleting abandoned temp object"
            );
            self.remove(PendingObject::Temp(object.temp_ref), &mut report)
                .await;
        }

        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "Orphan sweep completed"
        );
        Ok(report)
    }

    async fn remove(&self, object: PendingObject, report: &mut SweepReport) {
        if remove_object(self.store.as_ref(), &object).await {
            report.deleted += 1;
        } else {
            report.failed += 1;
        }
    }
}

fn is_stale(modified_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    modified_at < cutoff
}
