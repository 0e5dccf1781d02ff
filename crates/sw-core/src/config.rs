//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the HTTP server, storage paths, channels, probing, the
//! relay command template and supervision timings. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub channels: Vec<ChannelConfig>,
    pub source: SourceConfig,
    pub probe: ProbeConfig,
    pub sink: SinkConfig,
    pub relay: RelayConfig,
    pub codecs: CodecConfig,
    pub supervisor: SupervisorConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            channels: default_channels(),
            source: SourceConfig::default(),
            probe: ProbeConfig::default(),
            sink: SinkConfig::default(),
            relay: RelayConfig::default(),
            codecs: CodecConfig::default(),
            supervisor: SupervisorConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    ///
    /// A missing `channels` key yields the default three channels; an
    /// explicit empty list is kept as-is.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration from a file that must exist and parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Look up the upstream settings of a configured channel.
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.channels.is_empty() {
            warnings.push("no channels configured; nothing will be supervised".into());
        }

        let mut seen = HashSet::new();
        for (i, ch) in self.channels.iter().enumerate() {
            if ch.name.is_empty() {
                warnings.push(format!("channels[{i}].name is empty"));
            } else if ch.name.contains(['/', '\\']) || ch.name.starts_with('.') {
                warnings.push(format!(
                    "channels[{i}].name '{}' is not usable as a file name",
                    ch.name
                ));
            }
            if !seen.insert(ch.name.as_str()) {
                warnings.push(format!("channels[{i}].name '{}' is duplicated", ch.name));
            }
            if ch.host.is_empty() {
                warnings.push(format!("channels[{i}].host is empty"));
            }
        }

        if self.probe.retries == 0 {
            warnings.push("probe.retries is 0; probes will always fail".into());
        }

        if self.codecs.video.is_empty() {
            warnings.push("codecs.video is empty; no video stream will be supported".into());
        }
        if self.codecs.audio.is_empty() {
            warnings.push("codecs.audio is empty; no audio stream will be supported".into());
        }

        if self.supervisor.health_interval_ms == 0 {
            warnings.push(
                "supervisor.health_interval_ms is 0; the health sweep runs every millisecond"
                    .into(),
            );
        }

        if self.supervisor.stop_timeout_secs == 0 {
            warnings.push(
                "supervisor.stop_timeout_secs is 0; workers are killed without a grace period"
                    .into(),
            );
        }

        if self.supervisor.log_rotate_bytes == 0 {
            warnings.push(
                "supervisor.log_rotate_bytes is 0; worker logs are truncated on every start"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            static_dir: None,
        }
    }
}

/// Locations of the durable files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_file: PathBuf,
    pub history_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("/app/data/streams_state.json"),
            history_file: PathBuf::from("/app/data/history.jsonl"),
            log_dir: PathBuf::from("/app/logs"),
        }
    }
}

/// One relay slot and the upstream source it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_source_port")]
    pub port: u16,
}

fn default_source_port() -> u16 {
    6878
}

fn default_channels() -> Vec<ChannelConfig> {
    (1..=3)
        .map(|n| ChannelConfig {
            name: format!("ch{n}"),
            host: format!("ace{n}"),
            port: default_source_port(),
        })
        .collect()
}

/// Shape of the upstream stream URL, shared by channel sources and the
/// probing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path requested on the upstream host.
    pub path: String,
    /// Query parameter carrying the external id.
    pub id_param: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "/ace/getstream".into(),
            id_param: "id".into(),
        }
    }
}

/// Dedicated endpoint used only for probing candidate sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: "ace_probe".into(),
            port: default_source_port(),
            timeout_secs: 5,
            retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Downstream RTMP sink shared by all channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
    /// RTMP application; the channel name is appended as the stream key.
    pub app: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "nginx-rtmp".into(),
            port: 1935,
            app: "hls".into(),
        }
    }
}

/// Fixed codec/container parameters of the relay command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub format: String,
    /// Keyframe interval in frames (`-g` / `-keyint_min`).
    pub gop: u32,
    /// Seconds between ffmpeg progress lines in the worker log.
    pub stats_period: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            video_codec: "copy".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            format: "flv".into(),
            gop: 25,
            stats_period: 60,
        }
    }
}

/// Codec allow-lists used to classify probed streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            video: vec!["h264".into(), "h.264".into(), "avc".into()],
            audio: vec!["aac".into(), "aac_latm".into()],
        }
    }
}

/// Worker supervision timings and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub health_interval_ms: u64,
    pub stop_timeout_secs: u64,
    pub log_rotate_bytes: u64,
    /// Re-spawn channels that were running when the supervisor last stopped.
    pub resume_on_start: bool,
}

impl SupervisorConfig {
    /// Period of the health sweep; never zero.
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 10_000,
            stop_timeout_secs: 5,
            log_rotate_bytes: 5 * 1024 * 1024,
            resume_on_start: true,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}
