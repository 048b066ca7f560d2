//! Error types module
//!
//! This module provides the error taxonomy shared by every StorEdge crate.
//! All failures are unified under the `AppError` enum: field-level validation
//! failures, stream-abort size violations, missing records, conflicts, deadline and
//! cancellation aborts, and wrapped backend faults.
//!
//! The `Database` variant carries a `sqlx::Error` source when the `sqlx` feature is
//! enabled and a plain message otherwise.

use std::fmt;
use std::io;

use serde::Serialize;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like aborted streams
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe the outward signal a transport maps them to
pub trait ErrorMetadata {
    /// HTTP status code a transport should return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INVALID_FIELD")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Id,
    Name,
    Size,
    ContentType,
    Checksum,
    CreatedAt,
    OwnerId,
    Tags,
    IdempotencyKey,
    StorageRef,
    Range,
    Cursor,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Id => "id",
            FieldName::Name => "name",
            FieldName::Size => "size",
            FieldName::ContentType => "content_type",
            FieldName::Checksum => "checksum",
            FieldName::CreatedAt => "created_at",
            FieldName::OwnerId => "owner_id",
            FieldName::Tags => "tags",
            FieldName::IdempotencyKey => "idempotency_key",
            FieldName::StorageRef => "storage_ref",
            FieldName::Range => "range",
            FieldName::Cursor => "cursor",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason code attached to a field-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Empty,
    TooSmall,
    TooLong,
    ExceedsLimit,
    BadFormat,
    InvalidChar,
    SizeMismatch,
    InvalidRange,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Empty => "empty",
            Reason::TooSmall => "too_small",
            Reason::TooLong => "too_long",
            Reason::ExceedsLimit => "exceeds_limit",
            Reason::BadFormat => "bad_format",
            Reason::InvalidChar => "invalid_char",
            Reason::SizeMismatch => "size_mismatch",
            Reason::InvalidRange => "invalid_range",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: FieldName, reason: Reason },

    #[error("Payload too large: exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Deadline exceeded during {0}")]
    DeadlineExceeded(String),

    #[error("Cancelled during {0}")]
    Cancelled(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Shorthand for a field-level validation failure.
    pub fn invalid(field: FieldName, reason: Reason) -> Self {
        AppError::Invalid { field, reason }
    }

    /// True when this is `Invalid` for exactly the given field and reason.
    pub fn is_invalid(&self, field: FieldName, reason: Reason) -> bool {
        matches!(self, AppError::Invalid { field: f, reason: r } if *f == field && *r == reason)
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Invalid { .. } => "Invalid",
            AppError::TooLarge { .. } => "TooLarge",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::DeadlineExceeded(_) => "DeadlineExceeded",
            AppError::Cancelled(_) => "Cancelled",
            AppError::Storage(_) => "Storage",
            AppError::Database(_) => "Database",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Invalid { .. } => (
            400,
            "INVALID_FIELD",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooLarge { .. } => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Retry with a smaller payload"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            true,
            Some("Retry the request"),
            false,
            LogLevel::Warn,
        ),
        AppError::DeadlineExceeded(_) => (
            504,
            "DEADLINE_EXCEEDED",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Cancelled(_) => (
            499,
            "CANCELLED",
            true,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Invalid { field, reason } => format!("Invalid {}: {}", field, reason),
            AppError::TooLarge { limit } => {
                format!("Upload exceeds the maximum size of {} bytes", limit)
            }
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::DeadlineExceeded(_) => "Request deadline exceeded".to_string(),
            AppError::Cancelled(_) => "Request cancelled".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Database(_) => "Failed to access catalog".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
