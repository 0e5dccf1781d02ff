//! sw-store: durable storage for the streamwarden supervisor.
//!
//! Two files survive restarts: the assignment snapshot (a single JSON
//! object rewritten atomically after every mutation) and the history ledger
//! (append-only JSON lines, compacted on demand).

pub mod atomic;
pub mod ledger;
pub mod snapshot;

pub use atomic::write_atomic;
pub use ledger::Ledger;
pub use snapshot::{Snapshot, SnapshotEntry, SnapshotFile};
