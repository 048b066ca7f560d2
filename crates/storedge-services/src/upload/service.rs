use std::sync::Arc;

use storedge_core::{
    AppError, Clock, FieldName, File, FileId, IdGenerator, IdempotencyKey, Limits, OwnerId,
    Reason, UploadSpec, ValidatedUpload,
};
use storedge_db::{run_atomic, Catalog, Claim, TransactionCoordinator, TxOutcome};
use storedge_storage::ObjectStore;
use tokio::io::AsyncRead;
use tracing::Span;

use super::stage::UploadStage;
use super::stream::copy_with_digest;
use crate::cleanup::CleanupGuard;
use crate::context::RequestContext;
use crate::events::{spawn_publish, EventPublisher, FileEvent};

/// Result of a successful upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file: File,
    /// True when the idempotency key was already claimed and `file` is the earlier upload.
    pub replayed: bool,
}

/// How the catalog transaction ended.
enum Settled {
    Created,
    ClaimLost(FileId),
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
    transactions: Arc<dyn TransactionCoordinator>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
    limits: Limits,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn Catalog>,
        transactions: Arc<dyn TransactionCoordinator>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
        limits: Limits,
    ) -> Self {
        Self {
            store,
            catalog,
            transactions,
            ids,
            clock,
            events,
            limits,
        }
    }

    /// Ingest one file.
    ///
    /// On any error before the catalog transaction commits, no catalog row or
    /// idempotency record exists and the object written by this attempt has been
    /// removed (or logged as an orphan). If the future is dropped mid-flight the same
    /// removal is scheduled on the runtime.
    #[tracing::instrument(
        skip(self, ctx, spec, body),
        fields(
            upload.stage = tracing::field::Empty,
            file.id = tracing::field::Empty,
            owner_id = %spec.owner_id,
            declared_size = spec.size,
        )
    )]
    pub async fn upload<R>(
        &self,
        ctx: &RequestContext,
        spec: UploadSpec,
        mut body: R,
    ) -> Result<UploadOutcome, AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        enter(UploadStage::Validating);
        let upload = spec.validate(&self.limits)?;

        if let Some(key) = &upload.idempotency_key {
            if let Some(file) = self.replay(ctx, &upload.owner_id, key).await? {
                Span::current().record("file.id", file.id().as_str());
                tracing::info!(idempotency_key = %key, "Replaying earlier upload");
                return Ok(UploadOutcome {
                    file,
                    replayed: true,
                });
            }
        }

        let id = self.ids.new_id()?;
        Span::current().record("file.id", id.as_str());

        let mut guard = CleanupGuard::new(self.store.clone());
        let mut stage = UploadStage::Staging;
        let settled = self
            .ingest(ctx, &spec, &upload, &id, &mut body, &mut guard, &mut stage)
            .await;

        let (file, settled) = match settled {
            Ok(done) => done,
            Err(e) => {
                enter(UploadStage::Aborting);
                tracing::warn!(
                    error = %e,
                    failed_stage = %stage,
                    compensate = stage.can_abort(),
                    "Upload aborted"
                );
                guard.cleanup().await;
                return Err(e);
            }
        };

        match settled {
            Settled::Created => {
                guard.disarm();

                enter(UploadStage::Publishing);
                spawn_publish(self.events.clone(), FileEvent::uploaded(&file));

                enter(UploadStage::Done);
                tracing::info!(
                    checksum = %file.checksum(),
                    size = file.size(),
                    storage_ref = %file.storage_ref(),
                    "Upload committed"
                );
                Ok(UploadOutcome {
                    file,
                    replayed: false,
                })
            }
            Settled::ClaimLost(existing) => {
                enter(UploadStage::Aborting);
                tracing::info!(
                    existing_id = %existing,
                    "Idempotency key already claimed, discarding this attempt"
                );
                guard.cleanup().await;

                let winner = self.catalog.get(&existing).await?.ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Idempotency key is claimed by {} which no longer exists",
                        existing
                    ))
                })?;
                Ok(UploadOutcome {
                    file: winner,
                    replayed: true,
                })
            }
        }
    }

    /// Look up a key the owner claimed earlier. A key whose file has since been
    /// deleted does not replay.
    async fn replay(
        &self,
        ctx: &RequestContext,
        owner: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<File>, AppError> {
        let stage = UploadStage::Validating.as_str();
        let lookup = self.catalog.find_idempotency_key(owner, key);
        let Some(existing) = ctx.run(stage, lookup).await? else {
            return Ok(None);
        };

        let file = ctx.run(stage, self.catalog.get(&existing)).await?;
        if file.is_none() {
            tracing::debug!(existing_id = %existing, "Claimed file is gone, uploading anew");
        }
        Ok(file)
    }

    /// Stage, stream, commit and record the upload. `stage` is left at the stage
    /// that failed.
    #[allow(clippy::too_many_arguments)]
    async fn ingest<R>(
        &self,
        ctx: &RequestContext,
        spec: &UploadSpec,
        upload: &ValidatedUpload,
        id: &FileId,
        body: &mut R,
        guard: &mut CleanupGuard,
        stage: &mut UploadStage,
    ) -> Result<(File, Settled), AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        advance(stage, UploadStage::Staging);
        let (mut writer, temp) = ctx
            .run(
                stage.as_str(),
                self.store.write_temp(id, &upload.content_type),
            )
            .await?;
        guard.track_temp(temp.clone());

        advance(stage, UploadStage::Streaming);
        let limit = u64::try_from(self.limits.max_upload_bytes).unwrap_or(0);
        let summary = ctx
            .run(stage.as_str(), copy_with_digest(body, &mut writer, limit))
            .await?;
        drop(writer);

        if summary.bytes != upload.size {
            tracing::debug!(
                declared = upload.size,
                received = summary.bytes,
                "Upload body length differs from declared size"
            );
            return Err(AppError::invalid(FieldName::Size, Reason::SizeMismatch));
        }

        advance(stage, UploadStage::Committing);
        let storage_ref = ctx.run(stage.as_str(), self.store.commit(&temp)).await?;
        guard.track_committed(storage_ref.clone());

        advance(stage, UploadStage::ClaimingIdentity);
        let file = File::new(
            spec,
            id.clone(),
            summary.checksum,
            self.clock.now(),
            storage_ref,
            &self.limits,
        )?;

        // Once begun, the transaction runs to completion so its outcome is never
        // ambiguous to the caller.
        advance(stage, UploadStage::Transacting);
        ctx.check(stage.as_str())?;
        guard.enter_transaction();
        let settled = self.record(&file, upload.idempotency_key.clone()).await?;

        Ok((file, settled))
    }

    async fn record(
        &self,
        file: &File,
        key: Option<IdempotencyKey>,
    ) -> Result<Settled, AppError> {
        let file = file.clone();
        run_atomic(self.transactions.as_ref(), move |tx| {
            Box::pin(async move {
                tx.create(&file).await?;

                let Some(key) = key else {
                    return Ok(TxOutcome::Commit(Settled::Created));
                };

                match tx.claim_idempotency_key(file.owner_id(), &key, file.id()).await? {
                    Claim::Claimed => Ok(TxOutcome::Commit(Settled::Created)),
                    Claim::AlreadyClaimed(existing) => {
                        Ok(TxOutcome::Rollback(Settled::ClaimLost(existing)))
                    }
                }
            })
        })
        .await
    }
}

fn enter(stage: UploadStage) {
    Span::current().record("upload.stage", stage.as_str());
    tracing::debug!(stage = %stage, "Upload stage");
}

fn advance(current: &mut UploadStage, next: UploadStage) {
    *current = next;
    enter(next);
}
