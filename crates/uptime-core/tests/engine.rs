use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uptime_core::{
    CheckInterval, CheckOutcome, EngineError, HealthProbe, HttpProbe, MemoryStore,
    MonitoredResource, MonitoringEngine, Notification, NotificationKind, NotificationSink,
    NotifyError, ProbeResult, ResourceStatus, ResourceStore, ResourceUpdate, StoreError,
    Transition,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays `results` in order, repeating the last one once exhausted.
struct ScriptedProbe {
    step: AtomicUsize,
    results: Vec<ProbeResult>,
    delay: Option<Duration>,
    /// Per-call delays; calls past the end fall back to `delay`.
    delays: Vec<Duration>,
}

impl ScriptedProbe {
    fn new(results: Vec<ProbeResult>) -> Self {
        Self {
            step: AtomicUsize::new(0),
            results,
            delay: None,
            delays: Vec::new(),
        }
    }

    fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    fn always_online(ms: u64) -> Self {
        Self::new(vec![ProbeResult::online(ms, 200)])
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, _url: &str) -> ProbeResult {
        let step = self.step.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(step).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        self.results[step.min(self.results.len() - 1)].clone()
    }
}

#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn kinds(&self) -> Vec<NotificationKind> {
        self.received.lock().unwrap().iter().map(|n| n.kind).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.received.lock().unwrap().push(notification);
        if self.fail {
            return Err(NotifyError::Delivery("sink unavailable".into()));
        }
        Ok(())
    }
}

/// MemoryStore whose check-result writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

#[async_trait]
impl ResourceStore for FlakyStore {
    async fn get(&self, id: &str) -> Result<Option<MonitoredResource>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_owners(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_owners().await
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<MonitoredResource>, StoreError> {
        self.inner.list_for_owner(owner_id).await
    }

    async fn insert(&self, resource: MonitoredResource) -> Result<MonitoredResource, StoreError> {
        self.inner.insert(resource).await
    }

    async fn update(
        &self,
        id: &str,
        update: ResourceUpdate,
    ) -> Result<MonitoredResource, StoreError> {
        self.inner.update(id, update).await
    }

    async fn remove(&self, id: &str) -> Result<MonitoredResource, StoreError> {
        self.inner.remove(id).await
    }

    async fn apply_check_result(
        &self,
        id: &str,
        outcome: &CheckOutcome,
    ) -> Result<MonitoredResource, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write rejected".into()));
        }
        self.inner.apply_check_result(id, outcome).await
    }

    async fn set_warning(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<MonitoredResource, StoreError> {
        self.inner.set_warning(id, at).await
    }
}

struct Harness {
    engine: MonitoringEngine,
    store: Arc<FlakyStore>,
    probe: Arc<ScriptedProbe>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(probe: ScriptedProbe) -> Self {
        Self::with_sink(probe, RecordingSink::default())
    }

    fn with_sink(probe: ScriptedProbe, sink: RecordingSink) -> Self {
        let store = Arc::new(FlakyStore::default());
        let probe = Arc::new(probe);
        let sink = Arc::new(sink);
        let engine = MonitoringEngine::new(store.clone(), probe.clone(), sink.clone());
        Self {
            engine,
            store,
            probe,
            sink,
        }
    }

    async fn add(&self, resource: MonitoredResource) -> MonitoredResource {
        self.store.insert(resource).await.unwrap()
    }

    async fn reload(&self, id: &str) -> MonitoredResource {
        self.store.get(id).await.unwrap().unwrap()
    }
}

fn site(url: &str, interval: CheckInterval) -> MonitoredResource {
    MonitoredResource::new("owner-1", "Example", url, interval)
}

/// Lets spawned timer tasks run until they block on their next tick.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn first_check_runs_immediately() {
    let h = Harness::new(ScriptedProbe::always_online(120));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;

    let after = h.reload(&r.id).await;
    assert_eq!(after.status, ResourceStatus::Online);
    assert_eq!(after.response_time_ms, 120);
    assert_eq!(after.total_checks, 1);
    assert_eq!(after.successful_checks, 1);
    assert!(after.last_checked_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn counters_add_up_across_ticks() {
    let h = Harness::new(ScriptedProbe::new(vec![
        ProbeResult::online(10, 200),
        ProbeResult::offline(10, "connection refused"),
        ProbeResult::online(10, 200),
        ProbeResult::offline(10, "connection refused"),
    ]));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    tokio::time::sleep(MINUTE * 3 + Duration::from_millis(1)).await;

    let after = h.reload(&r.id).await;
    assert_eq!(after.total_checks, 4);
    assert_eq!(after.successful_checks + after.failed_checks, after.total_checks);
    assert_eq!(after.failed_checks, 2);
    assert_eq!(after.status, ResourceStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn double_start_keeps_a_single_timer() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    h.engine.start(r.clone()).await.unwrap();
    settle().await;

    let status = h.engine.status().await;
    assert_eq!(status.active_timer_count, 1);
    assert_eq!(status.tracked_resource_count, 1);
    assert_eq!(h.probe.calls(), 1);

    tokio::time::sleep(MINUTE).await;
    assert_eq!(h.probe.calls(), 2);

    assert!(h.engine.stop(&r.id).await);
    tokio::time::sleep(MINUTE * 10).await;
    assert_eq!(h.probe.calls(), 2);
    assert_eq!(h.reload(&r.id).await.total_checks, 2);
}

#[tokio::test]
async fn stop_without_timer_is_a_noop() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    assert!(!h.engine.stop("does-not-exist").await);
    assert_eq!(h.engine.status().await.tracked_resource_count, 0);
}

#[tokio::test]
async fn notifications_follow_transitions() {
    let h = Harness::new(ScriptedProbe::new(vec![
        ProbeResult::online(10, 200),
        ProbeResult::offline(10, "connection refused"),
        ProbeResult::offline(10, "connection refused"),
        ProbeResult::online(10, 200),
        ProbeResult::online(10, 200),
    ]));
    let r = h
        .add(site("https://a.example", CheckInterval::FiveMinutes).with_status(ResourceStatus::Online))
        .await;

    let mut transitions = Vec::new();
    for _ in 0..5 {
        let current = h.reload(&r.id).await;
        transitions.push(h.engine.perform_check(&current).await.transition);
    }

    assert_eq!(
        transitions,
        vec![
            None,
            Some(Transition::WentOffline),
            None,
            Some(Transition::CameBackOnline),
            None,
        ]
    );
    assert_eq!(
        h.sink.kinds(),
        vec![NotificationKind::WebsiteOffline, NotificationKind::WebsiteOnline]
    );

    let received = h.sink.received.lock().unwrap();
    let offline = &received[0];
    assert_eq!(offline.owner_id, "owner-1");
    assert_eq!(offline.resource_id, r.id);
    assert_eq!(offline.url, "https://a.example");
}

#[tokio::test]
async fn failed_bookkeeping_sets_warning_without_notifying() {
    let h = Harness::new(ScriptedProbe::new(vec![
        ProbeResult::offline(10, "connection refused"),
        ProbeResult::online(10, 200),
    ]));
    let r = h
        .add(site("https://a.example", CheckInterval::FiveMinutes).with_status(ResourceStatus::Online))
        .await;

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let report = h.engine.perform_check(&r).await;
    assert_eq!(report.status, ResourceStatus::Warning);
    assert_eq!(report.transition, None);
    assert!(!report.recorded);

    let after = h.reload(&r.id).await;
    assert_eq!(after.status, ResourceStatus::Warning);
    assert_eq!(after.total_checks, 0);
    assert!(h.sink.kinds().is_empty());

    // Recovering from warning counts as coming back online.
    h.store.fail_writes.store(false, Ordering::SeqCst);
    let report = h.engine.perform_check(&after).await;
    assert_eq!(report.transition, Some(Transition::CameBackOnline));
    assert_eq!(h.sink.kinds(), vec![NotificationKind::WebsiteOnline]);
}

#[tokio::test]
async fn notification_failures_do_not_fail_the_check() {
    let h = Harness::with_sink(
        ScriptedProbe::new(vec![ProbeResult::offline(10, "connection refused")]),
        RecordingSink::failing(),
    );
    let r = h
        .add(site("https://a.example", CheckInterval::FiveMinutes).with_status(ResourceStatus::Online))
        .await;

    let report = h.engine.perform_check(&r).await;
    assert!(report.recorded);
    assert_eq!(report.status, ResourceStatus::Offline);
    assert_eq!(h.sink.kinds(), vec![NotificationKind::WebsiteOffline]);
}

#[tokio::test]
async fn timeout_takes_an_online_resource_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let probe = HttpProbe::with_client(reqwest::Client::new(), Duration::from_millis(200));
    let engine = MonitoringEngine::new(store.clone(), Arc::new(probe), sink.clone());

    let r = store
        .insert(site(&server.uri(), CheckInterval::OneMinute).with_status(ResourceStatus::Online))
        .await
        .unwrap();

    let report = engine.perform_check(&r).await;
    assert!(!report.probe.is_online);

    let after = store.get(&r.id).await.unwrap().unwrap();
    assert_eq!(after.status, ResourceStatus::Offline);
    assert_eq!(after.failed_checks, r.failed_checks + 1);
    assert_eq!(sink.kinds(), vec![NotificationKind::WebsiteOffline]);
}

#[tokio::test(start_paused = true)]
async fn restart_uses_the_new_interval() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::ThirtyMinutes)).await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;
    assert_eq!(h.engine.scheduled_period(&r.id).await, Some(MINUTE * 30));

    let updated = h
        .store
        .update(
            &r.id,
            ResourceUpdate {
                check_interval: Some(CheckInterval::OneMinute),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.engine.restart(updated).await.unwrap();
    settle().await;
    assert_eq!(h.engine.scheduled_period(&r.id).await, Some(MINUTE));
    assert_eq!(h.probe.calls(), 2);

    tokio::time::sleep(MINUTE).await;
    assert_eq!(h.probe.calls(), 3);
    assert_eq!(h.engine.status().await.active_timer_count, 1);
}

#[tokio::test(start_paused = true)]
async fn tick_picks_up_interval_edits() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::FiveMinutes)).await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;

    h.store
        .update(
            &r.id,
            ResourceUpdate {
                check_interval: Some(CheckInterval::OneMinute),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    tokio::time::sleep(MINUTE * 5).await;
    assert_eq!(h.probe.calls(), 2);
    assert_eq!(h.engine.scheduled_period(&r.id).await, Some(MINUTE));

    tokio::time::sleep(MINUTE).await;
    assert_eq!(h.probe.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn deactivated_resource_stops_itself() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;
    h.store
        .update(
            &r.id,
            ResourceUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    tokio::time::sleep(MINUTE * 3).await;
    assert_eq!(h.probe.calls(), 1);
    assert!(!h.engine.is_monitoring(&r.id).await);
}

#[tokio::test(start_paused = true)]
async fn removed_resource_stops_itself() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;
    h.store.remove(&r.id).await.unwrap();

    tokio::time::sleep(MINUTE * 2).await;
    assert_eq!(h.probe.calls(), 1);
    assert_eq!(h.engine.status().await.tracked_resource_count, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_lets_an_in_flight_check_finish() {
    let h = Harness::new(ScriptedProbe::always_online(5).with_delay(Duration::from_secs(5)));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.engine.stop(&r.id).await);

    tokio::time::sleep(MINUTE * 5).await;
    let after = h.reload(&r.id).await;
    assert_eq!(after.total_checks, 1);
    assert_eq!(h.probe.calls(), 1);
    assert!(!h.engine.is_monitoring(&r.id).await);
}

#[tokio::test(start_paused = true)]
async fn start_ignores_inactive_resources() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h
        .add(site("https://a.example", CheckInterval::OneMinute).with_active(false))
        .await;

    h.engine.start(r.clone()).await.unwrap();
    settle().await;
    assert!(!h.engine.is_monitoring(&r.id).await);
    assert_eq!(h.probe.calls(), 0);
}

#[tokio::test]
async fn start_rejects_unusable_urls() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let err = h
        .engine
        .start(site("mailto:ops@example.com", CheckInterval::OneMinute))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidResource(_)));
}

#[tokio::test(start_paused = true)]
async fn cleanup_cancels_everything() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    for url in ["https://a.example", "https://b.example", "https://c.example"] {
        let r = h.add(site(url, CheckInterval::OneMinute)).await;
        h.engine.start(r).await.unwrap();
    }
    settle().await;
    assert_eq!(h.engine.status().await.active_timer_count, 3);

    assert_eq!(h.engine.cleanup().await, 3);
    let status = h.engine.status().await;
    assert_eq!(status.active_timer_count, 0);
    assert_eq!(status.tracked_resource_count, 0);
    assert!(status.intervals.is_empty());
    assert_eq!(h.engine.cleanup().await, 0);

    let calls = h.probe.calls();
    tokio::time::sleep(MINUTE * 5).await;
    assert_eq!(h.probe.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn bulk_start_and_stop_by_owner() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    h.add(site("https://a.example", CheckInterval::OneMinute)).await;
    h.add(site("https://b.example", CheckInterval::FiveMinutes)).await;
    h.add(site("https://c.example", CheckInterval::OneMinute).with_active(false))
        .await;
    h.add(MonitoredResource::new(
        "owner-2",
        "Other",
        "https://d.example",
        CheckInterval::ThirtyMinutes,
    ))
    .await;

    assert_eq!(h.engine.start_all().await.unwrap(), 3);
    settle().await;

    let status = h.engine.status().await;
    assert_eq!(status.tracked_resource_count, 3);
    assert!(status.intervals.values().any(|i| *i == CheckInterval::ThirtyMinutes));

    assert_eq!(h.engine.stop_for_owner("owner-1").await.unwrap(), 2);
    assert_eq!(h.engine.status().await.tracked_resource_count, 1);
    assert_eq!(h.engine.start_for_owner("owner-1").await.unwrap(), 2);
    assert_eq!(h.engine.status().await.tracked_resource_count, 3);
}

#[tokio::test(start_paused = true)]
async fn restart_by_id_of_missing_resource_stops_it() {
    let h = Harness::new(ScriptedProbe::always_online(5));
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;
    h.engine.start(r.clone()).await.unwrap();
    settle().await;

    h.store.remove(&r.id).await.unwrap();
    let err = h.engine.restart_by_id(&r.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(!h.engine.is_monitoring(&r.id).await);
}

#[tokio::test(start_paused = true)]
async fn detailed_status_reflects_latest_check() {
    let h = Harness::new(ScriptedProbe::always_online(42));
    let r = h.add(site("https://a.example", CheckInterval::FiveMinutes)).await;
    h.engine.start(r.clone()).await.unwrap();
    settle().await;

    let details = h.engine.detailed_status().await;
    assert_eq!(details.len(), 1);
    let d = &details[0];
    assert_eq!(d.resource_id, r.id);
    assert_eq!(d.status, ResourceStatus::Online);
    assert_eq!(d.period_ms, 300_000);
    assert!(d.last_check_at.is_some());
    assert!(d.timer_running);
}

#[tokio::test(start_paused = true)]
async fn replaced_timer_check_keeps_the_new_snapshot() {
    let probe = ScriptedProbe::new(vec![
        ProbeResult::offline(10, "connection refused"),
        ProbeResult::online(10, 200),
    ])
    .with_delays(vec![Duration::from_secs(10), Duration::from_secs(1)]);
    let h = Harness::new(probe);
    let r = h.add(site("https://a.example", CheckInterval::OneMinute)).await;

    h.engine.start(r.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.engine.restart(h.reload(&r.id).await).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.engine.detailed_status().await[0].status, ResourceStatus::Online);

    // The first task's slow check lands after the restarted task's check.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.reload(&r.id).await.total_checks, 2);

    let details = h.engine.detailed_status().await;
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].status, ResourceStatus::Online);
    assert!(details[0].timer_running);
}
