//! Webhook delivery for transition notifications.
//!
//! A [`crate::notify::ChannelSink`] pushes notifications into an mpsc channel.
//! The [`WebhookDispatcher`] drains that channel and POSTs a JSON envelope to
//! every configured endpoint that accepts the notification type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::DEFAULT_USER_AGENT;
use crate::notify::Notification;

pub const SIGNATURE_HEADER: &str = "X-Uptime-Signature-256";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Notification types to deliver (`website_offline`, `website_online`).
    /// Empty means all.
    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    /// HMAC-SHA256 key used to sign the body into [`SIGNATURE_HEADER`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_retries() -> u32 {
    2
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            events: Vec::new(),
            timeout_ms: default_webhook_timeout_ms(),
            max_retries: default_webhook_retries(),
            secret: None,
        }
    }

    pub fn accepts(&self, notification_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == notification_type)
    }
}

/// JSON envelope POSTed to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub version: u8,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub owner_id: String,
    pub resource_id: String,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn from_notification(notification: &Notification) -> Self {
        Self {
            version: 1,
            id: notification.id.clone(),
            timestamp: notification.created_at,
            notification_type: notification.kind.as_str().to_string(),
            owner_id: notification.owner_id.clone(),
            resource_id: notification.resource_id.clone(),
            data: serde_json::json!({
                "title": notification.title,
                "message": notification.message,
                "url": notification.url,
            }),
        }
    }
}

/// Background task that forwards notifications to webhooks.
pub struct WebhookDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    webhooks: Vec<WebhookConfig>,
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Notification>,
        webhooks: Vec<WebhookConfig>,
        client: Client,
    ) -> Self {
        Self {
            rx,
            webhooks,
            client,
        }
    }

    /// Run until every sender is dropped.
    pub async fn run(mut self) {
        debug!(webhook_count = self.webhooks.len(), "Webhook dispatcher started");

        while let Some(notification) = self.rx.recv().await {
            let payload = WebhookPayload::from_notification(&notification);
            let notification_type = payload.notification_type.clone();

            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize webhook payload");
                    continue;
                }
            };

            for wh in self.webhooks.iter().filter(|wh| wh.accepts(&notification_type)) {
                let timeout = Duration::from_millis(wh.timeout_ms);
                match deliver(
                    &self.client,
                    &wh.url,
                    &body,
                    wh.secret.as_deref(),
                    timeout,
                    wh.max_retries,
                )
                .await
                {
                    Ok(()) => debug!(url = %wh.url, notification_type, "Webhook delivered"),
                    Err(e) => warn!(
                        url = %wh.url,
                        notification_type,
                        error = %e,
                        "Webhook delivery failed"
                    ),
                }
            }
        }

        debug!("Webhook dispatcher shutting down");
    }
}

async fn deliver(
    client: &Client,
    url: &str,
    body: &[u8],
    secret: Option<&str>,
    timeout: Duration,
    max_retries: u32,
) -> Result<(), String> {
    let signature = match secret {
        Some(secret) => Some(sign_payload(body, secret)?),
        None => None,
    };
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
            tokio::time::sleep(backoff).await;
        }

        let mut req = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", DEFAULT_USER_AGENT)
            .timeout(timeout)
            .body(body.to_vec());
        if let Some(ref signature) = signature {
            req = req.header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                last_error = format!("HTTP {} from {}", status, url);
                if (400..500).contains(&status) && status != 429 {
                    return Err(last_error);
                }
            }
            Err(e) => {
                last_error = format!("Request to {} failed: {}", url, e);
            }
        }
    }

    Err(last_error)
}

fn sign_payload(body: &[u8], secret: &str) -> Result<String, String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Invalid webhook secret: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
