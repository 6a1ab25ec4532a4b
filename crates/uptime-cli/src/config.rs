//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [defaults]
//! probe_timeout_ms = 10000
//! notification_limit = 200
//!
//! [[webhook]]
//! url = "https://hooks.example.com/uptime"
//! events = ["website_offline"]
//! secret = "shared-key"
//!
//! [[website]]
//! owner = "ops"
//! name = "Storefront"
//! url = "https://shop.example.com"
//! interval = "1min"
//! ```

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use uptime_core::{CheckInterval, EngineConfig, MonitoredResource, NotificationKind, WebhookConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,

    #[serde(default)]
    pub website: Vec<WebsiteDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Engine settings; anything left out keeps the [`EngineConfig`] default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    pub probe_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub notification_limit: Option<usize>,
    pub max_concurrent_probes: Option<usize>,
}

impl DefaultsConfig {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut c = EngineConfig::default();
        if let Some(ms) = self.probe_timeout_ms {
            c = c.with_probe_timeout(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            c = c.with_connect_timeout(ms);
        }
        if let Some(ref ua) = self.user_agent {
            c = c.with_user_agent(ua.clone());
        }
        if let Some(n) = self.notification_limit {
            c = c.with_notification_limit(n);
        }
        if let Some(n) = self.max_concurrent_probes {
            c = c.with_max_concurrent_probes(n);
        }
        c
    }
}

/// A website seeded into the store at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteDef {
    pub id: Option<String>,

    #[serde(default = "default_owner")]
    pub owner: String,

    pub name: Option<String>,

    pub url: String,

    #[serde(default)]
    pub interval: CheckInterval,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_owner() -> String {
    "default".into()
}

fn default_active() -> bool {
    true
}

impl WebsiteDef {
    pub fn to_resource(&self) -> MonitoredResource {
        let name = self.name.clone().unwrap_or_else(|| self.url.clone());
        let resource = MonitoredResource::new(&self.owner, name, &self.url, self.interval)
            .with_active(self.active);
        match self.id {
            Some(ref id) => resource.with_id(id),
            None => resource,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let known_events = [
            NotificationKind::WebsiteOffline.as_str(),
            NotificationKind::WebsiteOnline.as_str(),
        ];
        for (i, wh) in self.webhook.iter().enumerate() {
            url::Url::parse(&wh.url)
                .map_err(|e| format!("Invalid webhook URL at index {}: {} ({})", i, wh.url, e))?;
            if let Some(unknown) = wh.events.iter().find(|e| !known_events.contains(&e.as_str())) {
                return Err(format!(
                    "Unknown webhook event '{}' at index {}: must be one of {}",
                    unknown,
                    i,
                    known_events.join(", ")
                ));
            }
        }

        let mut ids = HashSet::new();
        let mut owner_urls = HashSet::new();
        for (i, w) in self.website.iter().enumerate() {
            if let Some(ref id) = w.id {
                if id.trim().is_empty() {
                    return Err(format!("Website ID at index {} must not be empty", i));
                }
                if !ids.insert(id.as_str()) {
                    return Err(format!("Duplicate website ID: {}", id));
                }
            }
            if w.owner.trim().is_empty() {
                return Err(format!("Website owner at index {} must not be empty", i));
            }
            let parsed = url::Url::parse(&w.url)
                .map_err(|e| format!("Invalid website URL at index {}: {} ({})", i, w.url, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("Website URL must use http or https: {}", w.url));
            }
            if !owner_urls.insert((w.owner.as_str(), w.url.as_str())) {
                return Err(format!(
                    "Duplicate website URL for owner '{}': {}",
                    w.owner, w.url
                ));
            }
        }

        if let Some(0) = self.defaults.probe_timeout_ms {
            return Err("probe_timeout_ms must be greater than zero".into());
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}
