use std::error::Error as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{HealthProbe, ProbeResult};
use crate::config::EngineConfig;

/// HTTP GET probe backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(config: &EngineConfig) -> reqwest::Result<Self> {
        let client = Self::build_client(config)?;
        Ok(Self::with_client(client, config.probe_timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn build_client(config: &EngineConfig) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(config.probe_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(4)
            .gzip(true)
            .build()
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        let started = Instant::now();
        let result = self.client.get(url).timeout(self.timeout).send().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let status = response.status();
                // 4xx still proves the server answered.
                if status.as_u16() < 500 {
                    debug!(url, status = status.as_u16(), elapsed_ms, "Probe succeeded");
                    ProbeResult::online(elapsed_ms, status.as_u16())
                } else {
                    debug!(url, status = status.as_u16(), elapsed_ms, "Probe got server error");
                    let reason = status.canonical_reason().unwrap_or("Unknown");
                    ProbeResult::offline(elapsed_ms, format!("HTTP {} {}", status.as_u16(), reason))
                        .with_status_code(status.as_u16())
                }
            }
            Err(e) if e.is_timeout() => {
                debug!(url, elapsed_ms, "Probe timed out");
                ProbeResult::offline(
                    elapsed_ms,
                    format!("Timed out after {}ms", self.timeout.as_millis()),
                )
            }
            Err(e) => {
                debug!(url, elapsed_ms, error = %e, "Probe failed");
                ProbeResult::offline(elapsed_ms, error_chain(&e))
            }
        }
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
