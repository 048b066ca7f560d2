//! File lifecycle events
//!
//! Events are published after the catalog change they describe has committed.
//! Delivery is best-effort: publishers may fail, and callers only log the failure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storedge_core::{AppError, File, FileId};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEventType {
    #[serde(rename = "file.uploaded")]
    FileUploaded,
    #[serde(rename = "file.deleted")]
    FileDeleted,
}

impl FileEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileEventType::FileUploaded => "file.uploaded",
            FileEventType::FileDeleted => "file.deleted",
        }
    }
}

impl std::fmt::Display for FileEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub event_type: FileEventType,
    pub file_id: FileId,
    /// Full metadata; present for uploads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<File>,
    pub occurred_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn uploaded(file: &File) -> Self {
        Self {
            event_type: FileEventType::FileUploaded,
            file_id: file.id().clone(),
            file: Some(file.clone()),
            occurred_at: file.created_at(),
        }
    }

    pub fn deleted(id: &FileId, at: DateTime<Utc>) -> Self {
        Self {
            event_type: FileEventType::FileDeleted,
            file_id: id.clone(),
            file: None,
            occurred_at: at,
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &FileEvent) -> Result<(), AppError>;

    async fn file_uploaded(&self, file: &File) -> Result<(), AppError> {
        self.publish(&FileEvent::uploaded(file)).await
    }

    async fn file_deleted(&self, id: &FileId) -> Result<(), AppError> {
        self.publish(&FileEvent::deleted(id, Utc::now())).await
    }
}

/// Hand an event to `publisher` on a background task.
///
/// Failures are logged and never reach the request that produced the event.
pub(crate) fn spawn_publish(publisher: Arc<dyn EventPublisher>, event: FileEvent) {
    tokio::spawn(async move {
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type,
                file_id = %event.file_id,
                "Failed to publish file event"
            );
        }
    });
}

/// Writes each event to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &FileEvent) -> Result<(), AppError> {
        tracing::info!(
            event_type = %event.event_type,
            file_id = %event.file_id,
            occurred_at = %event.occurred_at,
            "File event"
        );
        Ok(())
    }
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Publishing with no subscribers succeeds; lagging subscribers miss events.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<FileEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FileEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: &FileEvent) -> Result<(), AppError> {
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(file_id = %event.file_id, "No event subscribers");
        }
        Ok(())
    }
}
