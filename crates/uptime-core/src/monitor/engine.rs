use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::monitor::error::EngineError;
use crate::monitor::event::{CheckReport, Transition};
use crate::monitor::state::{EngineStatus, RegistryEntry, TimerDetail};
use crate::monitor::timer::TimerHandle;
use crate::notify::NotificationSink;
use crate::probe::{HealthProbe, HttpProbe};
use crate::resource::{CheckOutcome, MonitoredResource, ResourceStatus};
use crate::store::ResourceStore;

type Registry = HashMap<String, RegistryEntry>;

/// Schedules recurring health checks, one task per monitored resource.
///
/// Cloning is cheap and every clone drives the same registry, so one engine can
/// be built at startup and handed to the HTTP layer and the bootstrap code.
#[derive(Clone)]
pub struct MonitoringEngine {
    store: Arc<dyn ResourceStore>,
    probe: Arc<dyn HealthProbe>,
    sink: Arc<dyn NotificationSink>,
    registry: Arc<Mutex<Registry>>,
    next_generation: Arc<AtomicU64>,
}

impl MonitoringEngine {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        probe: Arc<dyn HealthProbe>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            probe,
            sink,
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Engine backed by an [`HttpProbe`] built from `config`.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn ResourceStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> reqwest::Result<Self> {
        let probe = HttpProbe::new(config)?;
        Ok(Self::new(store, Arc::new(probe), sink))
    }

    /// Begin monitoring `resource`.
    ///
    /// Inactive resources are ignored. Any timer already running for the same id
    /// is cancelled first, so repeated starts never double-schedule. The first
    /// check runs right away, later ones every `check_interval`.
    pub async fn start(&self, resource: MonitoredResource) -> Result<(), EngineError> {
        validate(&resource)?;
        if !resource.is_active {
            debug!(resource_id = %resource.id, "Resource inactive, not monitoring");
            return Ok(());
        }

        let id = resource.id.clone();
        let period = resource.check_interval.as_duration();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.registry.lock().await;
        if let Some(previous) = registry.remove(&id) {
            debug!(resource_id = %id, "Replacing existing timer");
            previous.timer.cancel();
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(
            self.clone()
                .run_timer(resource.clone(), generation, shutdown_rx),
        );

        info!(
            resource_id = %id,
            url = %resource.target_url,
            interval = %resource.check_interval,
            "Started monitoring"
        );
        registry.insert(
            id,
            RegistryEntry {
                timer: TimerHandle::new(shutdown_tx, task, period),
                snapshot: resource,
                generation,
                started_at: Utc::now(),
                last_check_at: None,
            },
        );
        Ok(())
    }

    /// Stop monitoring `resource_id`. Returns whether a timer was running.
    pub async fn stop(&self, resource_id: &str) -> bool {
        let removed = self.registry.lock().await.remove(resource_id);
        match removed {
            Some(entry) => {
                entry.timer.cancel();
                info!(resource_id, "Stopped monitoring");
                true
            }
            None => false,
        }
    }

    /// Stop and start again with `resource`'s current settings.
    pub async fn restart(&self, resource: MonitoredResource) -> Result<(), EngineError> {
        self.stop(&resource.id).await;
        self.start(resource).await
    }

    /// Reload the resource from the store and restart it. A resource that no
    /// longer exists is only stopped.
    pub async fn restart_by_id(&self, resource_id: &str) -> Result<(), EngineError> {
        match self.store.get(resource_id).await? {
            Some(resource) => self.restart(resource).await,
            None => {
                self.stop(resource_id).await;
                Err(EngineError::NotFound(resource_id.to_string()))
            }
        }
    }

    /// Probe the resource once, record the result and notify on transitions.
    ///
    /// Never fails: an unreachable target is recorded as `offline`, and a
    /// result that cannot be written leaves the resource in `warning`.
    pub async fn perform_check(&self, resource: &MonitoredResource) -> CheckReport {
        self.check(resource, None).await
    }

    /// `generation` is set when a timer task runs the check; its result then
    /// only refreshes the registry entry that task still owns.
    async fn check(&self, resource: &MonitoredResource, generation: Option<u64>) -> CheckReport {
        let previous_status = resource.status;
        let probe = self.probe.probe(&resource.target_url).await;
        let checked_at = Utc::now();
        let outcome = CheckOutcome {
            is_online: probe.is_online,
            response_time_ms: probe.response_time_ms,
            checked_at,
        };

        match self.store.apply_check_result(&resource.id, &outcome).await {
            Ok(updated) => {
                let status = updated.status;
                let transition = Transition::between(previous_status, status);
                debug!(
                    resource_id = %resource.id,
                    %status,
                    response_time_ms = probe.response_time_ms,
                    status_code = ?probe.status_code,
                    "Check completed"
                );
                if let Some(transition) = transition {
                    self.notify(&updated, transition).await;
                }
                self.refresh_snapshot(updated, checked_at, generation).await;

                CheckReport {
                    resource_id: resource.id.clone(),
                    checked_at,
                    previous_status,
                    status,
                    probe,
                    transition,
                    recorded: true,
                }
            }
            Err(e) => {
                warn!(
                    resource_id = %resource.id,
                    error = %e,
                    "Failed to record check result, marking resource as warning"
                );
                match self.store.set_warning(&resource.id, checked_at).await {
                    Ok(updated) => self.refresh_snapshot(updated, checked_at, generation).await,
                    Err(e) => warn!(
                        resource_id = %resource.id,
                        error = %e,
                        "Failed to set warning status"
                    ),
                }

                CheckReport {
                    resource_id: resource.id.clone(),
                    checked_at,
                    previous_status,
                    status: ResourceStatus::Warning,
                    probe,
                    transition: None,
                    recorded: false,
                }
            }
        }
    }

    pub async fn status(&self) -> EngineStatus {
        let registry = self.registry.lock().await;
        EngineStatus {
            active_timer_count: registry
                .values()
                .filter(|e| !e.timer.is_finished())
                .count(),
            tracked_resource_count: registry.len(),
            intervals: registry
                .iter()
                .map(|(id, e)| (id.clone(), e.snapshot.check_interval))
                .collect(),
        }
    }

    /// Per-resource registry dump, sorted by id.
    pub async fn detailed_status(&self) -> Vec<TimerDetail> {
        let registry = self.registry.lock().await;
        let mut details: Vec<TimerDetail> = registry.values().map(TimerDetail::from_entry).collect();
        details.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        details
    }

    pub async fn is_monitoring(&self, resource_id: &str) -> bool {
        self.registry.lock().await.contains_key(resource_id)
    }

    /// Period the resource's timer currently ticks at.
    pub async fn scheduled_period(&self, resource_id: &str) -> Option<Duration> {
        self.registry
            .lock()
            .await
            .get(resource_id)
            .map(|e| e.timer.period())
    }

    /// Cancel every timer and empty the registry. Returns how many were cancelled.
    pub async fn cleanup(&self) -> usize {
        let entries: Vec<RegistryEntry> = {
            let mut registry = self.registry.lock().await;
            registry.drain().map(|(_, entry)| entry).collect()
        };
        let count = entries.len();
        for entry in entries {
            entry.timer.cancel();
        }
        if count > 0 {
            info!(count, "Cancelled all monitoring timers");
        }
        count
    }

    /// Start every active resource of `owner_id`. Returns how many were started.
    pub async fn start_for_owner(&self, owner_id: &str) -> Result<usize, EngineError> {
        let resources = self.store.list_active_for_owner(owner_id).await?;
        let mut started = 0;
        for resource in resources {
            let id = resource.id.clone();
            match self.start(resource).await {
                Ok(()) => started += 1,
                Err(e) => warn!(owner_id, resource_id = %id, error = %e, "Skipping resource"),
            }
        }
        debug!(owner_id, started, "Started monitoring for owner");
        Ok(started)
    }

    /// Stop every resource of `owner_id`, active or not. Returns how many timers
    /// were cancelled.
    pub async fn stop_for_owner(&self, owner_id: &str) -> Result<usize, EngineError> {
        let resources = self.store.list_for_owner(owner_id).await?;
        let mut stopped = 0;
        for resource in resources {
            if self.stop(&resource.id).await {
                stopped += 1;
            }
        }
        debug!(owner_id, stopped, "Stopped monitoring for owner");
        Ok(stopped)
    }

    /// Bootstrap: start the active resources of every owner in the store.
    pub async fn start_all(&self) -> Result<usize, EngineError> {
        let owners = self.store.list_owners().await?;
        let mut started = 0;
        for owner_id in &owners {
            started += self.start_for_owner(owner_id).await?;
        }
        info!(owners = owners.len(), started, "Monitoring bootstrapped");
        Ok(started)
    }

    async fn run_timer(
        self,
        resource: MonitoredResource,
        generation: u64,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let id = resource.id.clone();
        let mut period = resource.check_interval.as_duration();

        // Replaced before this task was first polled.
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            return;
        }
        self.check(&resource, Some(generation)).await;
        let mut ticker = check_ticker(period);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!(resource_id = %id, "Timer cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let current = match self.store.get(&id).await {
                Ok(Some(current)) if current.is_active => current,
                Ok(Some(_)) => {
                    info!(resource_id = %id, "Resource deactivated, stopping monitoring");
                    self.release(&id, generation).await;
                    return;
                }
                Ok(None) => {
                    info!(resource_id = %id, "Resource removed, stopping monitoring");
                    self.release(&id, generation).await;
                    return;
                }
                Err(e) => {
                    warn!(resource_id = %id, error = %e, "Failed to reload resource, skipping tick");
                    continue;
                }
            };

            let current_period = current.check_interval.as_duration();
            if current_period != period {
                info!(
                    resource_id = %id,
                    interval = %current.check_interval,
                    "Check interval changed, rescheduling"
                );
                period = current_period;
                ticker = check_ticker(period);
                self.set_period(&id, generation, period).await;
            }

            self.check(&current, Some(generation)).await;
        }
    }

    async fn notify(&self, resource: &MonitoredResource, transition: Transition) {
        info!(
            resource_id = %resource.id,
            url = %resource.target_url,
            ?transition,
            "Status transition"
        );
        let result = match transition {
            Transition::WentOffline => {
                self.sink
                    .notify_offline(
                        &resource.owner_id,
                        &resource.id,
                        &resource.name,
                        &resource.target_url,
                    )
                    .await
            }
            Transition::CameBackOnline => {
                self.sink
                    .notify_online(
                        &resource.owner_id,
                        &resource.id,
                        &resource.name,
                        &resource.target_url,
                    )
                    .await
            }
        };
        if let Err(e) = result {
            warn!(resource_id = %resource.id, error = %e, "Failed to deliver notification");
        }
    }

    /// Only resources that are being monitored keep a snapshot. A check from a
    /// superseded timer leaves the newer entry alone.
    async fn refresh_snapshot(
        &self,
        resource: MonitoredResource,
        checked_at: DateTime<Utc>,
        generation: Option<u64>,
    ) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(&resource.id) {
            if generation.is_some_and(|g| g != entry.generation) {
                return;
            }
            entry.snapshot = resource;
            entry.last_check_at = Some(checked_at);
        }
    }

    async fn set_period(&self, resource_id: &str, generation: u64, period: Duration) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(resource_id) {
            if entry.generation == generation {
                entry.timer.set_period(period);
            }
        }
    }

    /// Drop the registry entry of a timer that stopped on its own, unless a
    /// newer timer already took its place.
    async fn release(&self, resource_id: &str, generation: u64) {
        let mut registry = self.registry.lock().await;
        if registry
            .get(resource_id)
            .is_some_and(|e| e.generation == generation)
        {
            registry.remove(resource_id);
        }
    }
}

fn check_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn validate(resource: &MonitoredResource) -> Result<(), EngineError> {
    if resource.id.trim().is_empty() {
        return Err(EngineError::InvalidResource("resource id is empty".into()));
    }
    match url::Url::parse(&resource.target_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(EngineError::InvalidResource(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        ))),
        Err(e) => Err(EngineError::InvalidResource(format!(
            "invalid URL '{}': {}",
            resource.target_url, e
        ))),
    }
}
