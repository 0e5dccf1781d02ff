//! # sw-av
//!
//! External tool plumbing for the streamwarden supervisor.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for short-lived tool runs.
//! - **Relay workers** ([`worker`]) -- the fixed relay command template, log
//!   rotation, and process-group spawn/terminate of long-running ffmpeg
//!   workers ([`WorkerProcess`]).
//! - **Source probing** ([`Prober`], [`FfprobeProber`]) -- inspect a source's
//!   codecs with retries and classify them against the codec policy.

pub mod command;
pub mod probe;
pub mod tools;
pub mod worker;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, Prober};
pub use tools::{ToolInfo, ToolRegistry};
pub use worker::{RelayCommand, StopOutcome, WorkerProcess};
