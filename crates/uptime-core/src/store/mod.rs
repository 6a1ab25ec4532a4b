mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::resource::{CheckInterval, CheckOutcome, MonitoredResource};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Resource {0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Editable configuration of a resource. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ResourceUpdate {
    pub name: Option<String>,
    pub target_url: Option<String>,
    pub check_interval: Option<CheckInterval>,
    pub is_active: Option<bool>,
}

/// Persistence for monitored resources.
///
/// The engine only relies on the read methods plus `apply_check_result` and
/// `set_warning`; both writes must be atomic for a single resource so a check
/// never loses a concurrent counter increment.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<MonitoredResource>, StoreError>;

    async fn list_owners(&self) -> Result<Vec<String>, StoreError>;

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<MonitoredResource>, StoreError>;

    async fn list_active_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<MonitoredResource>, StoreError> {
        let all = self.list_for_owner(owner_id).await?;
        Ok(all.into_iter().filter(|r| r.is_active).collect())
    }

    async fn insert(&self, resource: MonitoredResource) -> Result<MonitoredResource, StoreError>;

    async fn update(
        &self,
        id: &str,
        update: ResourceUpdate,
    ) -> Result<MonitoredResource, StoreError>;

    async fn remove(&self, id: &str) -> Result<MonitoredResource, StoreError>;

    async fn apply_check_result(
        &self,
        id: &str,
        outcome: &CheckOutcome,
    ) -> Result<MonitoredResource, StoreError>;

    async fn set_warning(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<MonitoredResource, StoreError>;
}
