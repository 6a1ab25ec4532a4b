//! Transition notifications.
//!
//! The engine hands every online/offline transition to a [`NotificationSink`].
//! Delivery is fire-and-forget from the engine's point of view: errors are
//! logged and dropped by the caller, never retried there.

mod history;

pub use history::NotificationLog;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    ChannelClosed,
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WebsiteOffline,
    WebsiteOnline,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebsiteOffline => "website_offline",
            Self::WebsiteOnline => "website_online",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub owner_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub resource_id: String,
    pub url: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        kind: NotificationKind,
        owner_id: &str,
        resource_id: &str,
        url: &str,
        title: &str,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            kind,
            title: title.to_string(),
            message,
            resource_id: resource_id.to_string(),
            url: url.to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn website_offline(owner_id: &str, resource_id: &str, name: &str, url: &str) -> Self {
        Self::new(
            NotificationKind::WebsiteOffline,
            owner_id,
            resource_id,
            url,
            "Website Went Offline",
            format!("{} ({}) is now offline.", name, url),
        )
    }

    pub fn website_online(owner_id: &str, resource_id: &str, name: &str, url: &str) -> Self {
        Self::new(
            NotificationKind::WebsiteOnline,
            owner_id,
            resource_id,
            url,
            "Website Back Online",
            format!("{} ({}) is now back online.", name, url),
        )
    }
}

/// Receiver of website transition notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;

    async fn notify_offline(
        &self,
        owner_id: &str,
        resource_id: &str,
        name: &str,
        url: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(Notification::website_offline(owner_id, resource_id, name, url))
            .await
    }

    async fn notify_online(
        &self,
        owner_id: &str,
        resource_id: &str,
        name: &str,
        url: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(Notification::website_online(owner_id, resource_id, name, url))
            .await
    }
}

/// Pushes notifications into an mpsc channel, typically drained by a
/// [`crate::webhook::WebhookDispatcher`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification)
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

pub fn notification_channel() -> (
    mpsc::UnboundedSender<Notification>,
    mpsc::UnboundedReceiver<Notification>,
) {
    mpsc::unbounded_channel()
}

/// Delivers each notification to every inner sink. A failing sink does not stop
/// the others; the first error is reported once all have been tried.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(notification.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("boom".into()))
        }
    }

    #[test]
    fn offline_notification_text() {
        let n = Notification::website_offline("u1", "w1", "Shop", "https://shop.example");
        assert_eq!(n.kind, NotificationKind::WebsiteOffline);
        assert_eq!(n.title, "Website Went Offline");
        assert_eq!(n.message, "Shop (https://shop.example) is now offline.");
        assert!(!n.read);
    }

    #[test]
    fn online_notification_text() {
        let n = Notification::website_online("u1", "w1", "Shop", "https://shop.example");
        assert_eq!(n.kind.as_str(), "website_online");
        assert_eq!(n.title, "Website Back Online");
        assert_eq!(n.message, "Shop (https://shop.example) is now back online.");
    }

    #[tokio::test]
    async fn channel_sink_forwards_and_reports_closed() {
        let (tx, mut rx) = notification_channel();
        let sink = ChannelSink::new(tx);
        sink.notify_offline("u1", "w1", "Shop", "https://shop.example")
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.resource_id, "w1");

        drop(rx);
        let err = sink
            .notify_online("u1", "w1", "Shop", "https://shop.example")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::ChannelClosed));
    }

    #[tokio::test]
    async fn fanout_continues_past_failures() {
        let log = Arc::new(NotificationLog::new(10));
        let fanout = FanoutSink::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(log.clone());

        let result = fanout
            .notify_offline("u1", "w1", "Shop", "https://shop.example")
            .await;
        assert!(matches!(result, Err(NotifyError::Delivery(_))));
        assert_eq!(log.unread_count("u1"), 1);
    }
}
