//! Worker lifecycle: start, stop, restart and recovery of relay workers.
//!
//! Every operation on a channel runs under that channel's operation lock,
//! so a new worker is never spawned while the previous one is still
//! attached. Control operations never fail because of persistence: the
//! snapshot and ledger are written best effort and failures are logged.

use std::sync::Arc;

use chrono::Utc;
use sw_av::tools::FFMPEG;
use sw_av::{RelayCommand, StopOutcome, ToolRegistry, WorkerProcess};
use sw_core::config::Config;
use sw_core::{ChannelId, Error, HistoryRecord, Result};
use sw_store::Ledger;
use tokio::task::JoinSet;

use crate::state::{ChannelSlot, StateStore};

pub struct Supervisor {
    config: Arc<Config>,
    state: Arc<StateStore>,
    ledger: Arc<Ledger>,
    tools: Arc<ToolRegistry>,
}

impl Supervisor {
    pub fn new(
        config: Arc<Config>,
        state: Arc<StateStore>,
        ledger: Arc<Ledger>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            config,
            state,
            ledger,
            tools,
        }
    }

    /// Start a worker for `channel` reading `external_id`. A worker that is
    /// still attached is stopped first.
    pub async fn start(&self, channel: &ChannelId, external_id: &str) -> Result<String> {
        let slot = self.state.slot(channel)?;
        let _op = slot.lock_op().await;

        self.detach_and_stop(channel, slot).await;
        let result = self.spawn_worker(channel, slot, external_id);
        self.state.persist();
        result.map(|_| format!("Stream {channel} started"))
    }

    /// Stop the worker of `channel`, if any. Always succeeds for a valid
    /// channel; the outcome says whether anything was running.
    pub async fn stop(&self, channel: &ChannelId) -> Result<StopOutcome> {
        let slot = self.state.slot(channel)?;
        let _op = slot.lock_op().await;

        let outcome = self.end_session(channel, slot).await;
        self.state.persist();
        Ok(outcome)
    }

    /// Stop-if-running then start, under one hold of the operation lock.
    pub async fn restart(&self, channel: &ChannelId, external_id: &str) -> Result<String> {
        tracing::info!(channel = %channel, external_id, "Restarting stream");
        self.start(channel, external_id).await
    }

    /// Assign a new source to a channel: close the running session, record
    /// the new title, start the worker and log the new session.
    pub async fn assign(
        &self,
        channel: &ChannelId,
        external_id: &str,
        title: Option<String>,
    ) -> Result<String> {
        if external_id.trim().is_empty() {
            return Err(Error::MissingParameter("external_id".into()));
        }
        let slot = self.state.slot(channel)?;
        let _op = slot.lock_op().await;

        self.end_session(channel, slot).await;

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| channel.default_title());
        self.state
            .set_assignment(channel, external_id, Some(title.clone()))?;

        let result = self.spawn_worker(channel, slot, external_id);
        if result.is_ok() {
            self.record(&HistoryRecord::start(
                channel.as_str(),
                external_id,
                Some(title.as_str()),
            ));
        }
        self.state.persist();
        result.map(|_| format!("Stream {channel} started"))
    }

    /// Restart the worker of `channel` if it has exited on its own.
    ///
    /// Returns `Ok(true)` when a replacement was spawned. The stored
    /// external id and title are kept. A failed spawn leaves the dead handle
    /// attached so the next sweep tries again.
    pub async fn recover(&self, channel: &ChannelId) -> Result<bool> {
        let slot = self.state.slot(channel)?;
        if !worker_exited(slot) {
            return Ok(false);
        }

        let _op = slot.lock_op().await;
        // An explicit stop may have detached the worker meanwhile.
        if !worker_exited(slot) {
            return Ok(false);
        }
        let stored = slot.state().external_id.clone();
        let Some(external_id) = stored else {
            slot.state().worker = None;
            self.state.persist();
            return Ok(false);
        };

        tracing::warn!(channel = %channel, external_id = %external_id, "Worker exited unexpectedly; restarting");
        let result = self.spawn_worker(channel, slot, &external_id);
        self.state.persist();
        result.map(|_| true)
    }

    /// Start the given channels from their stored assignments.
    pub async fn resume(&self, channels: Vec<ChannelId>) {
        for channel in channels {
            let Ok(slot) = self.state.slot(&channel) else {
                continue;
            };
            let _op = slot.lock_op().await;
            let stored = slot.state().external_id.clone();
            let Some(external_id) = stored else {
                continue;
            };
            match self.spawn_worker(&channel, slot, &external_id) {
                Ok(_) => tracing::info!(channel = %channel, external_id = %external_id, "Resumed stream"),
                Err(e) => tracing::error!(channel = %channel, "Failed to resume stream: {e}"),
            }
        }
        self.state.persist();
    }

    /// Terminate every attached worker. The snapshot is not rewritten, so
    /// the assignments that were active survive into the next boot.
    pub async fn shutdown(&self) {
        let timeout = self.config.supervisor.stop_timeout();
        let mut stopping = JoinSet::new();

        for channel in self.state.channels().ids() {
            let Ok(slot) = self.state.slot(&channel) else {
                continue;
            };
            let _op = slot.lock_op().await;
            let worker = slot.state().worker.take();
            if let Some(worker) = worker {
                stopping.spawn(async move { (channel, worker.terminate(timeout).await) });
            }
        }

        while let Some(joined) = stopping.join_next().await {
            match joined {
                Ok((channel, outcome)) => {
                    tracing::info!(channel = %channel, ?outcome, "Worker stopped for shutdown");
                }
                Err(e) => tracing::error!("Shutdown task failed: {e}"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers; callers hold the channel's operation lock.
    // -----------------------------------------------------------------------

    fn spawn_worker(&self, channel: &ChannelId, slot: &ChannelSlot, external_id: &str) -> Result<u32> {
        let spawn_failure = |e: Error| Error::spawn_failure(channel.as_str(), e.to_string());

        let program = self.tools.require(FFMPEG).map_err(spawn_failure)?;
        let upstream = self
            .state
            .channels()
            .upstream(channel)
            .map_err(spawn_failure)?;
        let command = RelayCommand::build(&self.config, program, channel, upstream, external_id)
            .map_err(spawn_failure)?;

        let worker = WorkerProcess::spawn(&command, self.config.supervisor.log_rotate_bytes)
            .map_err(|e| {
                tracing::error!(channel = %channel, "Failed to spawn worker: {e}");
                Error::spawn_failure(channel.as_str(), e.to_string())
            })?;
        let pid = worker.pid();

        let mut state = slot.state();
        state.worker = Some(worker);
        state.external_id = Some(external_id.to_string());
        state.started_at.get_or_insert_with(Utc::now);
        tracing::info!(channel = %channel, pid, external_id, "Started relay worker");
        Ok(pid)
    }

    /// Detach the attached worker, if any, and stop it.
    async fn detach_and_stop(&self, channel: &ChannelId, slot: &ChannelSlot) -> StopOutcome {
        let worker = slot.state().worker.take();
        let Some(worker) = worker else {
            return StopOutcome::NotRunning;
        };

        let pid = worker.pid();
        let outcome = worker
            .terminate(self.config.supervisor.stop_timeout())
            .await;
        match &outcome {
            StopOutcome::NotRunning => {
                tracing::info!(channel = %channel, pid, "Worker was not running");
            }
            StopOutcome::Terminated => tracing::info!(channel = %channel, pid, "Worker stopped"),
            StopOutcome::Killed => tracing::warn!(channel = %channel, pid, "Worker killed"),
            StopOutcome::Unconfirmed(reason) => {
                tracing::error!(channel = %channel, pid, reason = %reason, "Worker stop unconfirmed");
            }
        }
        outcome
    }

    /// Stop the worker and close the session in the ledger.
    async fn end_session(&self, channel: &ChannelId, slot: &ChannelSlot) -> StopOutcome {
        let (attached, external_id, title, started_at) = {
            let mut state = slot.state();
            (
                state.worker.is_some(),
                state.external_id.clone(),
                state.title.clone(),
                state.started_at.take(),
            )
        };

        let outcome = self.detach_and_stop(channel, slot).await;
        if let (true, Some(external_id)) = (attached, external_id) {
            self.record(&HistoryRecord::stop(
                channel.as_str(),
                &external_id,
                title.as_deref(),
                started_at,
            ));
        }
        outcome
    }

    fn record(&self, record: &HistoryRecord) {
        if let Err(e) = self.ledger.append(record) {
            tracing::error!(channel = %record.channel, "Failed to append history: {e}");
        }
    }
}

fn worker_exited(slot: &ChannelSlot) -> bool {
    slot.state()
        .worker
        .as_mut()
        .is_some_and(|w| w.has_exited())
}
