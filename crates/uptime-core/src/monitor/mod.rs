pub mod engine;
pub mod error;
pub mod event;
pub mod state;
pub mod timer;

pub use engine::MonitoringEngine;
pub use error::EngineError;
pub use event::{CheckReport, Transition};
pub use state::{EngineStatus, TimerDetail};
pub use timer::TimerHandle;
