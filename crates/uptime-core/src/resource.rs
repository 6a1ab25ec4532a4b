use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ONE_MINUTE_MS: u64 = 60 * 1000;
const FIVE_MINUTES_MS: u64 = 5 * ONE_MINUTE_MS;
const THIRTY_MINUTES_MS: u64 = 30 * ONE_MINUTE_MS;

/// Last observed state of a monitored website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Online,
    Offline,
    /// The check itself could not be recorded; says nothing about the target.
    Warning,
}

impl ResourceStatus {
    pub const ALL: [ResourceStatus; 3] = [Self::Online, Self::Offline, Self::Warning];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a resource is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckInterval {
    #[serde(rename = "1min")]
    OneMinute,
    #[default]
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
}

impl CheckInterval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::ThirtyMinutes => "30min",
        }
    }

    pub fn as_millis(self) -> u64 {
        interval_to_ms(self.as_str())
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }
}

impl fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval '{0}': must be 1min, 5min, or 30min")]
pub struct InvalidInterval(pub String);

impl FromStr for CheckInterval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(Self::OneMinute),
            "5min" => Ok(Self::FiveMinutes),
            "30min" => Ok(Self::ThirtyMinutes),
            other => Err(InvalidInterval(other.to_string())),
        }
    }
}

/// Maps a raw interval value to milliseconds.
///
/// Unknown values fall back to five minutes instead of failing: a resource
/// checked at the wrong cadence is recoverable, a scheduler that refuses to
/// schedule is not.
pub fn interval_to_ms(value: &str) -> u64 {
    match value {
        "1min" => ONE_MINUTE_MS,
        "5min" => FIVE_MINUTES_MS,
        "30min" => THIRTY_MINUTES_MS,
        _ => FIVE_MINUTES_MS,
    }
}

/// A website registered for uptime monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredResource {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub target_url: String,
    pub check_interval: CheckInterval,
    pub is_active: bool,
    pub status: ResourceStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub response_time_ms: u64,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub last_went_down_at: Option<DateTime<Utc>>,
    pub last_went_up_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoredResource {
    /// A fresh, active resource. Starts out `offline` until its first check.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        target_url: impl Into<String>,
        check_interval: CheckInterval,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            target_url: target_url.into(),
            check_interval,
            is_active: true,
            status: ResourceStatus::Offline,
            last_checked_at: None,
            response_time_ms: 0,
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            last_went_down_at: None,
            last_went_up_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn uptime_percentage(&self) -> f64 {
        if self.total_checks == 0 {
            return 0.0;
        }
        self.successful_checks as f64 / self.total_checks as f64 * 100.0
    }

    /// Applies a completed check. Counters, latency, timestamp and status move
    /// together so the counter invariant holds after every call.
    pub fn record_outcome(&mut self, outcome: &CheckOutcome) {
        let new_status = if outcome.is_online {
            ResourceStatus::Online
        } else {
            ResourceStatus::Offline
        };

        self.total_checks += 1;
        if outcome.is_online {
            self.successful_checks += 1;
        } else {
            self.failed_checks += 1;
        }
        self.response_time_ms = outcome.response_time_ms;
        self.last_checked_at = Some(outcome.checked_at);

        if new_status != self.status {
            match new_status {
                ResourceStatus::Online => self.last_went_up_at = Some(outcome.checked_at),
                ResourceStatus::Offline => self.last_went_down_at = Some(outcome.checked_at),
                ResourceStatus::Warning => {}
            }
        }
        self.status = new_status;
        self.updated_at = outcome.checked_at;
    }

    pub fn mark_warning(&mut self, at: DateTime<Utc>) {
        self.status = ResourceStatus::Warning;
        self.last_checked_at = Some(at);
        self.updated_at = at;
    }
}

/// The bookkeeping half of a probe result, as written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub is_online: bool,
    pub response_time_ms: u64,
    pub checked_at: DateTime<Utc>,
}
