use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = concat!("uptime-monitor/", env!("CARGO_PKG_VERSION"));

/// Configuration shared by the monitoring engine and its HTTP probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for a single probe request, connect included (default: 10s).
    pub probe_timeout: Duration,
    /// TCP/TLS connect timeout for probes (default: 5s).
    pub connect_timeout: Duration,
    /// `User-Agent` header sent with every probe.
    pub user_agent: String,
    /// Notifications retained per owner in the in-memory history.
    pub notification_limit: usize,
    /// Concurrency cap for ad-hoc batch probes (CLI `check`).
    pub max_concurrent_probes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            notification_limit: 100,
            max_concurrent_probes: 4,
        }
    }
}

impl EngineConfig {
    pub fn with_probe_timeout(mut self, ms: u64) -> Self {
        self.probe_timeout = Duration::from_millis(ms);
        if self.connect_timeout > self.probe_timeout {
            self.connect_timeout = self.probe_timeout;
        }
        self
    }

    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout = Duration::from_millis(ms).min(self.probe_timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_notification_limit(mut self, limit: usize) -> Self {
        self.notification_limit = limit.max(1);
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max.max(1);
        self
    }
}
