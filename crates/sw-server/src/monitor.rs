//! Background health monitor.
//!
//! Every `health_interval` the monitor looks for workers that exited on
//! their own and restarts them with their stored assignment. Channels are
//! handled one at a time; a failure on one channel is logged and the sweep
//! moves on.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::state::StateStore;
use crate::supervisor::Supervisor;

pub struct HealthMonitor {
    state: Arc<StateStore>,
    supervisor: Arc<Supervisor>,
    interval: Duration,
}

impl HealthMonitor {
    /// A zero `interval` is raised to one millisecond.
    pub fn new(state: Arc<StateStore>, supervisor: Arc<Supervisor>, interval: Duration) -> Self {
        Self {
            state,
            supervisor,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run until the cancellation token is triggered. The first sweep
    /// happens one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval = ?self.interval, "Health monitor started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let restarted = self.sweep().await;
                    if restarted > 0 {
                        tracing::info!(restarted, "Health sweep restarted workers");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Health monitor stopped");
    }

    /// Check every channel once; returns how many workers were restarted.
    pub async fn sweep(&self) -> usize {
        let mut restarted = 0;
        for channel in self.state.channels().ids() {
            match self.supervisor.recover(&channel).await {
                Ok(true) => restarted += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(channel = %channel, "Automatic restart failed: {e}"),
            }
        }
        restarted
    }

    /// Spawn [`HealthMonitor::run`] on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
