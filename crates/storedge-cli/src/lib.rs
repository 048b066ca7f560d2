//! Wiring and argument helpers for the `storedge` binary.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use storedge_core::{CatalogBackend, Clock, Config, SystemClock, UlidGenerator};
use storedge_db::{setup_database, Catalog, MemoryCatalog, PgCatalog, TransactionCoordinator};
use storedge_infra::{WebhookConfig, WebhookEventPublisher};
use storedge_services::{
    DeletionService, EventPublisher, ListingService, OrphanSweeper, RetrievalService,
    TracingEventPublisher, UploadService,
};
use storedge_storage::{create_object_store, ByteRange};

/// Every service, wired to the adapters the config selects.
pub struct Services {
    pub uploads: UploadService,
    pub retrieval: RetrievalService,
    pub deletion: DeletionService,
    pub listing: ListingService,
    pub sweeper: OrphanSweeper,
}

pub async fn build_services(config: &Config) -> anyhow::Result<Services> {
    let store = create_object_store(config)
        .await
        .context("Failed to initialize object store")?;

    let (catalog, transactions): (Arc<dyn Catalog>, Arc<dyn TransactionCoordinator>) =
        match config.catalog_backend() {
            CatalogBackend::Postgres => {
                let pool = setup_database(config).await?;
                let catalog = PgCatalog::new(pool);
                (Arc::new(catalog.clone()), Arc::new(catalog))
            }
            CatalogBackend::Memory => {
                tracing::warn!("DATABASE_URL not set; using in-memory catalog");
                let catalog = MemoryCatalog::new();
                (Arc::new(catalog.clone()), Arc::new(catalog))
            }
        };

    let events: Arc<dyn EventPublisher> = match WebhookConfig::from_config(config) {
        Some(webhook) => {
            tracing::info!(url = %webhook.url, "Publishing file events to webhook");
            Arc::new(WebhookEventPublisher::new(webhook)?)
        }
        None => Arc::new(TracingEventPublisher),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(Services {
        uploads: UploadService::new(
            store.clone(),
            catalog.clone(),
            transactions.clone(),
            Arc::new(UlidGenerator::new()),
            clock.clone(),
            events.clone(),
            config.limits,
        ),
        retrieval: RetrievalService::new(catalog.clone(), store.clone()),
        deletion: DeletionService::new(
            catalog.clone(),
            transactions,
            store.clone(),
            clock.clone(),
            events,
        ),
        listing: ListingService::new(catalog.clone()),
        sweeper: OrphanSweeper::new(store, catalog, clock, config.orphan_grace_period()),
    })
}

/// Parse an inclusive byte range written as `START-END`.
pub fn parse_range(raw: &str) -> anyhow::Result<ByteRange> {
    let (start, end) = raw
        .split_once('-')
        .with_context(|| format!("Range '{}' must look like START-END", raw))?;
    let start: u64 = start.trim().parse().context("Invalid range start")?;
    let end: u64 = end.trim().parse().context("Invalid range end")?;
    Ok(ByteRange::new(start, end))
}

/// Best-effort content type from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
