//! In-memory channel assignments backed by the persisted snapshot.
//!
//! Each channel owns a [`ChannelSlot`] with two locks:
//!
//! - an async operation lock that serialises start/stop/restart of the
//!   channel and is held across the whole operation, including the wait
//!   for a worker to exit;
//! - a short synchronous lock over the [`ChannelState`] fields, never held
//!   across an await, so status reads and snapshots do not wait for a slow
//!   stop.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use sw_av::WorkerProcess;
use sw_core::{ChannelId, ChannelSet, ChannelStatus, Error, Result};
use sw_store::{Snapshot, SnapshotEntry, SnapshotFile};

/// Mutable fields of one channel's assignment.
#[derive(Debug, Default)]
pub struct ChannelState {
    pub external_id: Option<String>,
    pub title: Option<String>,
    /// Attached worker; `Some` while the process is believed alive.
    pub worker: Option<WorkerProcess>,
    /// When the current session began. Survives automatic restarts and is
    /// cleared by an explicit stop.
    pub started_at: Option<DateTime<Utc>>,
}

impl ChannelState {
    /// Public view. `running` checks the process without detaching it.
    pub fn status(&mut self) -> ChannelStatus {
        let running = self.worker.as_mut().is_some_and(|w| !w.has_exited());
        ChannelStatus {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            running,
        }
    }

    fn to_entry(&self) -> SnapshotEntry {
        SnapshotEntry {
            external_id: self.external_id.clone(),
            title: self.title.clone(),
            active: self.worker.is_some(),
        }
    }
}

/// Locks guarding one channel.
#[derive(Debug)]
pub struct ChannelSlot {
    op: tokio::sync::Mutex<()>,
    state: Mutex<ChannelState>,
}

impl ChannelSlot {
    /// Acquire the operation lock for a start/stop/restart sequence.
    pub async fn lock_op(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.op.lock().await
    }

    /// Short-lived access to the assignment fields.
    pub fn state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock()
    }
}

/// Assignments of every configured channel.
#[derive(Debug)]
pub struct StateStore {
    channels: ChannelSet,
    slots: HashMap<ChannelId, ChannelSlot>,
    file: SnapshotFile,
    /// Serialises snapshot writes so the last writer holds the newest view.
    persist_lock: Mutex<()>,
    /// Channels that were active in the snapshot found at load time.
    resumable: Mutex<Vec<ChannelId>>,
}

impl StateStore {
    /// Build the store from the snapshot file.
    ///
    /// Every configured channel gets an entry; a missing file yields empty
    /// assignments, a corrupt one is logged and treated as empty, and
    /// entries for unknown channels are ignored. No worker is attached.
    pub fn load(channels: ChannelSet, file: SnapshotFile) -> Self {
        let snapshot = match file.read() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(path = %file.path().display(), "Ignoring unreadable snapshot: {e}");
                Snapshot::new()
            }
        };

        for name in snapshot.keys() {
            if channels.resolve(name).is_err() {
                tracing::warn!(channel = %name, "Snapshot entry for unknown channel ignored");
            }
        }

        let mut slots = HashMap::new();
        let mut resumable = Vec::new();
        for id in channels.ids() {
            let entry = snapshot.get(id.as_str()).cloned().unwrap_or_default();
            if entry.active && entry.external_id.is_some() {
                resumable.push(id.clone());
            }
            let slot = ChannelSlot {
                op: tokio::sync::Mutex::new(()),
                state: Mutex::new(ChannelState {
                    external_id: entry.external_id,
                    title: entry.title,
                    worker: None,
                    started_at: None,
                }),
            };
            slots.insert(id, slot);
        }

        tracing::info!(
            channels = channels.len(),
            resumable = resumable.len(),
            "Loaded channel state from {}",
            file.path().display()
        );

        Self {
            channels,
            slots,
            file,
            persist_lock: Mutex::new(()),
            resumable: Mutex::new(resumable),
        }
    }

    /// Validate a channel name against the configured set.
    pub fn resolve(&self, name: &str) -> Result<ChannelId> {
        self.channels.resolve(name)
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn slot(&self, channel: &ChannelId) -> Result<&ChannelSlot> {
        self.slots
            .get(channel)
            .ok_or_else(|| Error::InvalidChannel(channel.to_string()))
    }

    /// Status of one channel.
    pub fn get(&self, channel: &ChannelId) -> Result<ChannelStatus> {
        Ok(self.slot(channel)?.state().status())
    }

    /// Status of every channel, keyed by name.
    pub fn all(&self) -> BTreeMap<String, ChannelStatus> {
        self.channels
            .ids()
            .into_iter()
            .filter_map(|id| {
                let status = self.slots.get(&id)?.state().status();
                Some((id.to_string(), status))
            })
            .collect()
    }

    /// Record the external id and title of a channel without touching its
    /// worker.
    pub fn set_assignment(
        &self,
        channel: &ChannelId,
        external_id: &str,
        title: Option<String>,
    ) -> Result<()> {
        let mut state = self.slot(channel)?.state();
        state.external_id = Some(external_id.to_string());
        state.title = title;
        Ok(())
    }

    /// External ids currently attached to a live worker.
    pub fn live_external_ids(&self) -> HashSet<String> {
        self.slots
            .values()
            .filter_map(|slot| {
                let mut state = slot.state();
                let live = state.worker.as_mut().is_some_and(|w| !w.has_exited());
                if live {
                    state.external_id.clone()
                } else {
                    None
                }
            })
            .collect()
    }

    /// Channels to restart at boot; drained on first call.
    pub fn take_resumable(&self) -> Vec<ChannelId> {
        std::mem::take(&mut *self.resumable.lock())
    }

    /// Write all assignments to the snapshot file.
    pub fn snapshot(&self) -> Result<()> {
        let _guard = self.persist_lock.lock();
        let snapshot: Snapshot = self
            .slots
            .iter()
            .map(|(id, slot)| (id.to_string(), slot.state().to_entry()))
            .collect();
        self.file.write(&snapshot)
    }

    /// Best-effort snapshot; failures are logged and never rolled back.
    pub fn persist(&self) {
        if let Err(e) = self.snapshot() {
            tracing::error!("Failed to persist channel state: {e}");
        }
    }
}
