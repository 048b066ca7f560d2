//! File deletion
//!
//! The catalog row goes first, inside a transaction; the object is removed after
//! the transaction commits. A file that is no longer listed is gone as far as
//! callers are concerned, so a failed object delete only leaves an orphan behind.

use std::sync::Arc;

use storedge_core::{AppError, Clock, FileId};
use storedge_db::{run_atomic, Catalog, TransactionCoordinator, TxOutcome};
use storedge_storage::ObjectStore;

use crate::cleanup::{remove_object, PendingObject};
use crate::context::RequestContext;
use crate::events::{spawn_publish, EventPublisher, FileEvent};

#[derive(Clone)]
pub struct DeletionService {
    catalog: Arc<dyn Catalog>,
    transactions: Arc<dyn TransactionCoordinator>,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
}

impl DeletionService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        transactions: Arc<dyn TransactionCoordinator>,
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog,
            transactions,
            store,
            clock,
            events,
        }
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &RequestContext, raw_id: &str) -> Result<(), AppError> {
        let id = FileId::parse(raw_id)?;
        let file = ctx
            .run("verifying", self.catalog.get(&id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

        ctx.check("deleting")?;
        let target = id.clone();
        let removed = run_atomic(self.transactions.as_ref(), move |tx| {
            Box::pin(async move {
                let removed = tx.delete(&target).await?;
                Ok(TxOutcome::Commit(removed))
            })
        })
        .await?;

        if !removed {
            // Deleted concurrently between the lookup and the transaction.
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }

        spawn_publish(
            self.events.clone(),
            FileEvent::deleted(&id, self.clock.now()),
        );

        let object = PendingObject::Committed(file.storage_ref().clone());
        if !remove_object(self.store.as_ref(), &object).await {
            tracing::warn!(file_id = %id, "File deleted, object left for the orphan sweep");
        }

        tracing::info!(file_id = %id, "File deleted");
        Ok(())
    }
}
