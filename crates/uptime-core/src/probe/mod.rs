mod http;

pub use http::HttpProbe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a single reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub is_online: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ProbeResult {
    pub fn online(response_time_ms: u64, status_code: u16) -> Self {
        Self {
            is_online: true,
            response_time_ms,
            status_code: Some(status_code),
            error_detail: None,
        }
    }

    pub fn offline(response_time_ms: u64, error_detail: impl Into<String>) -> Self {
        Self {
            is_online: false,
            response_time_ms,
            status_code: None,
            error_detail: Some(error_detail.into()),
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }
}

/// Checks whether a URL is reachable.
///
/// Implementations never fail: every failure mode is folded into an offline
/// [`ProbeResult`]. The trait is object-safe and Send + Sync so one probe can be
/// shared by every resource task.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}
