//! Metadata lookup and object reads.

use std::sync::Arc;

use storedge_core::{AppError, FieldName, File, FileId, Reason, StorageRef};
use storedge_db::Catalog;
use storedge_storage::{ByteRange, ObjectReader, ObjectStore};

use crate::context::RequestContext;

#[derive(Clone)]
pub struct RetrievalService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn ObjectStore>,
}

impl RetrievalService {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn ObjectStore>) -> Self {
        Self { catalog, store }
    }

    /// Fetch metadata for a caller-supplied identifier (trimmed, case-insensitive).
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &RequestContext, raw_id: &str) -> Result<File, AppError> {
        let id = FileId::parse(raw_id)?;
        ctx.run("get", self.catalog.get(&id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// Open a committed object, optionally restricted to an inclusive byte range.
    ///
    /// A range outside the object is rejected before the store is asked for bytes.
    /// The returned reader belongs to the caller and is released on drop.
    #[tracing::instrument(skip(self, ctx, storage_ref), fields(storage_ref = %storage_ref))]
    pub async fn open(
        &self,
        ctx: &RequestContext,
        storage_ref: &StorageRef,
        range: Option<ByteRange>,
    ) -> Result<ObjectReader, AppError> {
        if let Some(range) = range {
            let size = ctx.run("stat", self.store.stat(storage_ref)).await?;
            if !range.fits(size) {
                tracing::debug!(
                    start = range.start,
                    end = range.end,
                    size,
                    "Rejecting byte range"
                );
                return Err(AppError::invalid(FieldName::Range, Reason::InvalidRange));
            }
        }

        ctx.run("open", self.store.open(storage_ref, range)).await
    }

    /// `get` followed by `open` on the file's storage ref.
    pub async fn open_file(
        &self,
        ctx: &RequestContext,
        raw_id: &str,
        range: Option<ByteRange>,
    ) -> Result<(File, ObjectReader), AppError> {
        let file = self.get(ctx, raw_id).await?;
        let reader = self.open(ctx, file.storage_ref(), range).await?;
        Ok((file, reader))
    }
}
