//! StorEdge services
//!
//! Orchestration over the storage and catalog ports: upload, retrieval, deletion,
//! listing and the orphan sweep, plus the event publisher port and the request
//! context that bounds every port call.

pub(crate) mod cleanup;
pub mod context;
pub mod deletion;
pub mod events;
pub mod listing;
pub mod retrieval;
pub mod sweep;
pub mod upload;

pub use context::RequestContext;
pub use deletion::DeletionService;
pub use events::{
    BroadcastEventPublisher, EventPublisher, FileEvent, FileEventType, TracingEventPublisher,
};
pub use listing::{ListRequest, ListingService};
pub use retrieval::RetrievalService;
pub use sweep::{OrphanSweeper, SweepReport};
pub use upload::{UploadOutcome, UploadService, UploadStage};
