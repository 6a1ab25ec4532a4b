use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{ResourceStore, ResourceUpdate, StoreError};
use crate::resource::{CheckOutcome, MonitoredResource};

/// Process-local resource store.
///
/// Each record sits behind its own shard lock, so check results and edits to one
/// resource are applied atomically without blocking other resources.
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: DashMap<String, MonitoredResource>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn url_taken(&self, owner_id: &str, url: &str, except_id: Option<&str>) -> bool {
        self.resources.iter().any(|entry| {
            let r = entry.value();
            r.owner_id == owner_id && r.target_url == url && Some(r.id.as_str()) != except_id
        })
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<MonitoredResource>, StoreError> {
        Ok(self.resources.get(id).map(|r| r.value().clone()))
    }

    async fn list_owners(&self) -> Result<Vec<String>, StoreError> {
        let owners: BTreeSet<String> = self
            .resources
            .iter()
            .map(|r| r.value().owner_id.clone())
            .collect();
        Ok(owners.into_iter().collect())
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<MonitoredResource>, StoreError> {
        let mut owned: Vec<MonitoredResource> = self
            .resources
            .iter()
            .filter(|r| r.value().owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn insert(&self, resource: MonitoredResource) -> Result<MonitoredResource, StoreError> {
        if self.resources.contains_key(&resource.id) {
            return Err(StoreError::Conflict(format!(
                "Resource {} already exists",
                resource.id
            )));
        }
        if self.url_taken(&resource.owner_id, &resource.target_url, None) {
            return Err(StoreError::Conflict(format!(
                "Website with URL {} already exists",
                resource.target_url
            )));
        }
        self.resources.insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn update(
        &self,
        id: &str,
        update: ResourceUpdate,
    ) -> Result<MonitoredResource, StoreError> {
        let owner_id = self
            .resources
            .get(id)
            .map(|r| r.value().owner_id.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(ref url) = update.target_url {
            if self.url_taken(&owner_id, url, Some(id)) {
                return Err(StoreError::Conflict(format!(
                    "Website with URL {} already exists",
                    url
                )));
            }
        }

        let mut entry = self
            .resources
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let r = entry.value_mut();
        if let Some(name) = update.name {
            r.name = name;
        }
        if let Some(url) = update.target_url {
            r.target_url = url;
        }
        if let Some(interval) = update.check_interval {
            r.check_interval = interval;
        }
        if let Some(active) = update.is_active {
            r.is_active = active;
        }
        r.updated_at = Utc::now();
        Ok(r.clone())
    }

    async fn remove(&self, id: &str) -> Result<MonitoredResource, StoreError> {
        self.resources
            .remove(id)
            .map(|(_, r)| r)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn apply_check_result(
        &self,
        id: &str,
        outcome: &CheckOutcome,
    ) -> Result<MonitoredResource, StoreError> {
        let mut entry = self
            .resources
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.value_mut().record_outcome(outcome);
        Ok(entry.value().clone())
    }

    async fn set_warning(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<MonitoredResource, StoreError> {
        let mut entry = self
            .resources
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.value_mut().mark_warning(at);
        Ok(entry.value().clone())
    }
}
