//! Domain types shared between the store, the supervisor and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of one channel's assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChannelStatus {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub running: bool,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Kind of assignment event recorded in the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEvent {
    #[default]
    Start,
    Stop,
}

/// One immutable ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HistoryRecord {
    pub time: DateTime<Utc>,
    pub channel: String,
    pub external_id: String,
    pub title: Option<String>,
    /// Run time in seconds of the session a stop record closes.
    pub duration: Option<u64>,
    #[serde(default)]
    pub event: HistoryEvent,
}

impl HistoryRecord {
    /// A start record stamped with the current time.
    pub fn start(channel: &str, external_id: &str, title: Option<&str>) -> Self {
        Self {
            time: Utc::now(),
            channel: channel.to_string(),
            external_id: external_id.to_string(),
            title: title.map(str::to_string),
            duration: None,
            event: HistoryEvent::Start,
        }
    }

    /// A stop record closing a session that started at `started_at`.
    pub fn stop(
        channel: &str,
        external_id: &str,
        title: Option<&str>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        let time = Utc::now();
        let duration = started_at.map(|s| (time - s).num_seconds().max(0) as u64);
        Self {
            time,
            channel: channel.to_string(),
            external_id: external_id.to_string(),
            title: title.map(str::to_string),
            duration,
            event: HistoryEvent::Stop,
        }
    }
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

/// Subset of an ffprobe stream entry relevant to relay decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StreamInfo {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_frame_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<String>,
}

/// Codec composition of a source and whether the relay supports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProbeResult {
    pub video: Option<StreamInfo>,
    pub audio: Option<StreamInfo>,
    pub is_video_supported: bool,
    pub is_audio_supported: bool,
    pub is_fully_supported: bool,
}
