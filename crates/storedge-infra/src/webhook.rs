//! Webhook event delivery
//!
//! Each file event is POSTed as JSON to one configured endpoint. When a signing
//! secret is configured the request carries
//! `X-Webhook-Signature: v1=<hex HMAC-SHA256 of "{timestamp}.{body}">`, where
//! `timestamp` is the `X-Webhook-Timestamp` header (unix seconds of the event).

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use storedge_core::{AppError, Config};
use storedge_services::{EventPublisher, FileEvent};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
pub const EVENT_HEADER: &str = "X-Webhook-Event";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub signing_secret: Option<String>,
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Webhook settings from the application config, if a URL is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.webhook_url.as_ref().map(|url| Self {
            url: url.clone(),
            signing_secret: config.webhook_signing_secret.clone(),
            timeout: Duration::from_secs(10),
        })
    }
}

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook signing key: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct WebhookEventPublisher {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookEventPublisher {
    pub fn new(config: WebhookConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build webhook client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EventPublisher for WebhookEventPublisher {
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, file_id = %event.file_id)
    )]
    async fn publish(&self, event: &FileEvent) -> Result<(), AppError> {
        let body = serde_json::to_vec(event)?;
        let timestamp = event.occurred_at.timestamp();

        let mut request = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.event_type.as_str())
            .header(TIMESTAMP_HEADER, timestamp.to_string());

        if let Some(secret) = &self.config.signing_secret {
            let signature = sign_payload(secret, timestamp, &body)?;
            request = request.header(SIGNATURE_HEADER, format!("v1={}", signature));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Webhook delivery failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Internal(format!(
                "Webhook endpoint returned {}",
                status
            )));
        }

        tracing::debug!(status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}
