//! sw-core: shared configuration, errors, channel ids and domain types.
//!
//! This crate is the foundational dependency for all other sw-* crates,
//! providing the validated channel set, a unified error type, the
//! supported-codec policy and application configuration.

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use channel::{ChannelId, ChannelSet};
pub use codec::CodecPolicy;
pub use error::{Error, Result};
pub use types::*;
