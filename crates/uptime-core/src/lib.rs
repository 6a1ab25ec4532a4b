#![forbid(unsafe_code)]

pub mod config;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod resource;
pub mod store;
pub mod webhook;

pub use config::EngineConfig;
pub use monitor::{
    CheckReport, EngineError, EngineStatus, MonitoringEngine, TimerDetail, TimerHandle, Transition,
};
pub use notify::{
    notification_channel, ChannelSink, FanoutSink, Notification, NotificationKind,
    NotificationLog, NotificationSink, NotifyError,
};
pub use probe::{HealthProbe, HttpProbe, ProbeResult};
pub use resource::{
    interval_to_ms, CheckInterval, CheckOutcome, InvalidInterval, MonitoredResource,
    ResourceStatus,
};
pub use store::{MemoryStore, ResourceStore, ResourceUpdate, StoreError};
pub use webhook::{WebhookConfig, WebhookDispatcher, WebhookPayload};
