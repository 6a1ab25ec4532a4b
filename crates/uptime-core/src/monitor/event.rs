use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeResult;
use crate::resource::ResourceStatus;

/// A status change worth telling the owner about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    WentOffline,
    CameBackOnline,
}

impl Transition {
    /// Only online -> offline and {offline, warning} -> online are transitions.
    /// Anything ending in `warning`, and every repeat, is not.
    pub fn between(previous: ResourceStatus, current: ResourceStatus) -> Option<Self> {
        match (previous, current) {
            (ResourceStatus::Online, ResourceStatus::Offline) => Some(Self::WentOffline),
            (ResourceStatus::Offline | ResourceStatus::Warning, ResourceStatus::Online) => {
                Some(Self::CameBackOnline)
            }
            _ => None,
        }
    }
}

/// What a single `perform_check` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub resource_id: String,
    pub checked_at: DateTime<Utc>,
    pub previous_status: ResourceStatus,
    pub status: ResourceStatus,
    pub probe: ProbeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    /// False when the result could not be written and the resource fell back
    /// to `warning`.
    pub recorded: bool,
}
