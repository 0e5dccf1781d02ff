//! Channel identifiers and the fixed channel set.
//!
//! Channels come from configuration and never change at runtime. A
//! [`ChannelId`] is only handed out by [`ChannelSet::resolve`], so holding
//! one means the name was checked against the configured set.

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;

use crate::config::{ChannelConfig, Config};
use crate::{Error, Result};

/// Name of a configured relay slot (e.g. `ch1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Return the channel name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title used when a start request does not carry one: `Channel 2` for
    /// `ch2`, `Channel news` for a name without trailing digits.
    pub fn default_title(&self) -> String {
        let digits_at = self
            .0
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i);

        match digits_at {
            Some(i) => format!("Channel {}", &self.0[i..]),
            None => format!("Channel {}", self.0),
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The statically configured set of channels, in configuration order.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: Vec<ChannelConfig>,
}

impl ChannelSet {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self { channels }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.channels.clone())
    }

    /// Validate a channel name against the configured set.
    pub fn resolve(&self, name: &str) -> Result<ChannelId> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| ChannelId(c.name.clone()))
            .ok_or_else(|| Error::InvalidChannel(name.to_string()))
    }

    /// Upstream settings for a channel.
    pub fn upstream(&self, channel: &ChannelId) -> Result<&ChannelConfig> {
        self.channels
            .iter()
            .find(|c| c.name == channel.as_str())
            .ok_or_else(|| Error::InvalidChannel(channel.to_string()))
    }

    /// All channel ids in configuration order.
    pub fn ids(&self) -> Vec<ChannelId> {
        self.channels
            .iter()
            .map(|c| ChannelId(c.name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
