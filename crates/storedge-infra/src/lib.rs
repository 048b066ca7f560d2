//! StorEdge Infrastructure Library
//!
//! Shared infrastructure for StorEdge binaries:
//! - Telemetry initialization
//! - Client-facing error responses
//! - Signed webhook event delivery

pub mod error;
pub mod telemetry;

#[cfg(feature = "webhook")]
pub mod webhook;

pub use error::ErrorResponse;
pub use telemetry::init_telemetry;

#[cfg(feature = "webhook")]
pub use webhook::{WebhookConfig, WebhookEventPublisher};
