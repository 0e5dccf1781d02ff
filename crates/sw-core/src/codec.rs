//! Supported-codec policy: static allow-lists with case-insensitive lookup.

use crate::config::CodecConfig;

/// Allow-lists of codec identifiers the relay can pass through unchanged.
#[derive(Debug, Clone)]
pub struct CodecPolicy {
    video: Vec<String>,
    audio: Vec<String>,
}

impl CodecPolicy {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            video: config.video.iter().map(|c| c.to_lowercase()).collect(),
            audio: config.audio.iter().map(|c| c.to_lowercase()).collect(),
        }
    }

    pub fn is_video_supported(&self, codec: &str) -> bool {
        let codec = codec.to_lowercase();
        self.video.iter().any(|c| *c == codec)
    }

    pub fn is_audio_supported(&self, codec: &str) -> bool {
        let codec = codec.to_lowercase();
        self.audio.iter().any(|c| *c == codec)
    }
}

impl Default for CodecPolicy {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}
