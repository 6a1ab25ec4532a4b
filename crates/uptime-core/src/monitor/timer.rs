use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to the recurring check task of one resource.
///
/// Cancelling signals the task to leave its loop. A check that is already
/// running finishes and its result is still written; no further tick fires.
#[derive(Debug)]
pub struct TimerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    period: Duration,
}

impl TimerHandle {
    pub(crate) fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>, period: Duration) -> Self {
        Self {
            shutdown,
            task,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub(crate) fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        // The task may already have exited on its own; nothing to signal then.
        let _ = self.shutdown.send(());
    }
}
