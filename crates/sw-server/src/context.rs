//! Application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state and with the background monitor. It only holds `Arc`s, so
//! cloning is cheap.

use std::path::PathBuf;
use std::sync::Arc;

use sw_av::tools::FFPROBE;
use sw_av::{FfprobeProber, Prober, ToolRegistry};
use sw_core::config::Config;
use sw_core::ChannelSet;
use sw_store::{Ledger, SnapshotFile};

use crate::monitor::HealthMonitor;
use crate::state::StateStore;
use crate::supervisor::Supervisor;

#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration.
    pub config: Arc<Config>,
    /// Channel assignments and worker handles.
    pub state: Arc<StateStore>,
    /// Worker lifecycle operations.
    pub supervisor: Arc<Supervisor>,
    /// History of assignment sessions.
    pub ledger: Arc<Ledger>,
    /// Source prober.
    pub prober: Arc<dyn Prober>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
}

impl AppContext {
    /// Build the context from configuration: discover tools, load the
    /// snapshot and open the ledger. No worker is started.
    pub fn new(config: Config) -> Self {
        let tools = Arc::new(ToolRegistry::discover(&config.tools));
        let ffprobe = tools
            .require(FFPROBE)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from(FFPROBE));
        let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new(ffprobe, &config));
        Self::with_prober(config, tools, prober)
    }

    /// Build the context with a custom prober.
    pub fn with_prober(config: Config, tools: Arc<ToolRegistry>, prober: Arc<dyn Prober>) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(StateStore::load(
            ChannelSet::from_config(&config),
            SnapshotFile::new(&config.storage.state_file),
        ));
        let ledger = Arc::new(Ledger::new(&config.storage.history_file));
        let supervisor = Arc::new(Supervisor::new(
            config.clone(),
            state.clone(),
            ledger.clone(),
            tools.clone(),
        ));

        Self {
            config,
            state,
            supervisor,
            ledger,
            prober,
            tools,
        }
    }

    /// Health monitor bound to this context's state and supervisor.
    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.state.clone(),
            self.supervisor.clone(),
            self.config.supervisor.health_interval(),
        )
    }
}
