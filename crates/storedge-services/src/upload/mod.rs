//! Upload orchestration
//!
//! Drives one ingestion request from validation to a committed catalog row:
//! stage the bytes in a temp object while hashing them, promote the temp object,
//! then record the file and claim its idempotency key in one catalog transaction.

mod service;
mod stage;
mod stream;

pub use service::{UploadOutcome, UploadService};
pub use stage::UploadStage;
