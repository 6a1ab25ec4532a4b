use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timer::TimerHandle;
use crate::resource::{CheckInterval, MonitoredResource, ResourceStatus};

/// In-memory registry slot for one monitored resource.
#[derive(Debug)]
pub(crate) struct RegistryEntry {
    pub timer: TimerHandle,
    pub snapshot: MonitoredResource,
    /// Distinguishes this timer from earlier ones for the same id, so a
    /// superseded task can never remove its replacement.
    pub generation: u64,
    pub started_at: DateTime<Utc>,
    pub last_check_at: Option<DateTime<Utc>>,
}

/// Aggregate engine status for operational surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub active_timer_count: usize,
    pub tracked_resource_count: usize,
    pub intervals: BTreeMap<String, CheckInterval>,
}

/// Verbose per-resource view of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDetail {
    pub resource_id: String,
    pub owner_id: String,
    pub name: String,
    pub target_url: String,
    pub check_interval: CheckInterval,
    pub period_ms: u64,
    pub status: ResourceStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_at: Option<DateTime<Utc>>,
    pub timer_running: bool,
}

impl TimerDetail {
    pub(crate) fn from_entry(entry: &RegistryEntry) -> Self {
        let r = &entry.snapshot;
        Self {
            resource_id: r.id.clone(),
            owner_id: r.owner_id.clone(),
            name: r.name.clone(),
            target_url: r.target_url.clone(),
            check_interval: r.check_interval,
            period_ms: entry.timer.period().as_millis() as u64,
            status: r.status,
            started_at: entry.started_at,
            last_check_at: entry.last_check_at,
            timer_running: !entry.timer.is_finished(),
        }
    }
}
