//! Client-facing error responses
//!
//! Transports render an `AppError` through `ErrorResponse`. Details and the error
//! type are only exposed for non-sensitive errors outside production.

use serde::Serialize;
use storedge_core::{AppError, ErrorMetadata, LogLevel};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    pub fn from_app_error(err: &AppError, is_production: bool) -> Self {
        let expose = !is_production && !err.is_sensitive();
        Self {
            error: err.client_message(),
            code: err.error_code().to_string(),
            status: err.http_status_code(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(String::from),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
        }
    }
}

/// Log an error at the level it declares for itself.
pub fn log_error(err: &AppError) {
    let error_type = err.error_type();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error = %err, error_type, "Request failed"),
        LogLevel::Warn => tracing::warn!(error = %err, error_type, "Request failed"),
        LogLevel::Error => {
            tracing::error!(error = %err.detailed_message(), error_type, "Request failed")
        }
    }
}
