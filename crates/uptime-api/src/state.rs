use std::sync::Arc;

use chrono::{DateTime, Utc};

use uptime_core::{HealthProbe, MemoryStore, MonitoringEngine, NotificationLog, ResourceStore};

#[derive(Clone)]
pub struct AppState {
    pub engine: MonitoringEngine,
    pub store: Arc<dyn ResourceStore>,
    pub notifications: Arc<NotificationLog>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        engine: MonitoringEngine,
        store: Arc<dyn ResourceStore>,
        notifications: Arc<NotificationLog>,
    ) -> Self {
        Self {
            engine,
            store,
            notifications,
            started_at: Utc::now(),
        }
    }

    /// Memory-backed state whose engine reports transitions to the
    /// notification log only.
    pub fn in_memory(probe: Arc<dyn HealthProbe>, notification_limit: usize) -> Self {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let notifications = Arc::new(NotificationLog::new(notification_limit));
        let engine = MonitoringEngine::new(store.clone(), probe, notifications.clone());
        Self::new(engine, store, notifications)
    }
}
