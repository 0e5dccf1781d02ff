//! Source probing via `ffprobe`.
//!
//! A probe asks the dedicated probing endpoint for a candidate external id,
//! reads the first video and audio streams, and classifies their codecs
//! against the [`CodecPolicy`]. Failed attempts are retried after a short
//! delay; when every attempt fails the caller gets
//! [`sw_core::Error::ProbeUnavailable`], never a result with all flags false.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sw_core::config::{Config, ProbeConfig, SourceConfig};
use sw_core::{CodecPolicy, ProbeResult, StreamInfo};

use crate::command::ToolCommand;
use crate::worker::upstream_url;

/// Inspects a candidate source before it is assigned to a channel.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the source identified by `external_id`.
    async fn probe(&self, external_id: &str) -> sw_core::Result<ProbeResult>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    endpoint: ProbeConfig,
    source: SourceConfig,
    policy: CodecPolicy,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, config: &Config) -> Self {
        Self {
            ffprobe_path,
            endpoint: config.probe.clone(),
            source: config.source.clone(),
            policy: CodecPolicy::new(&config.codecs),
        }
    }

    /// Microseconds form of the timeout understood by ffprobe's
    /// `-timeout` / `-rw_timeout` options.
    fn io_timeout_us(&self) -> String {
        self.endpoint.timeout().as_micros().to_string()
    }

    async fn probe_once(&self, url: &str) -> sw_core::Result<ProbeResult> {
        let io_timeout = self.io_timeout_us();
        let output = ToolCommand::new(self.ffprobe_path.clone())
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .args(["-timeout", io_timeout.as_str(), "-rw_timeout", io_timeout.as_str()])
            .arg(url)
            .timeout(self.endpoint.timeout())
            .execute()
            .await?;

        let parsed: FfprobeOutput = serde_json::from_str(&output.stdout)
            .map_err(|e| sw_core::Error::tool("ffprobe", format!("JSON parse error: {e}")))?;

        Ok(classify(parsed.streams, &self.policy))
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, external_id: &str) -> sw_core::Result<ProbeResult> {
        let url = upstream_url(
            &self.endpoint.host,
            self.endpoint.port,
            &self.source,
            external_id,
        )?;
        let attempts = self.endpoint.retries;
        let mut last_error = String::from("no probe attempts configured");

        for attempt in 1..=attempts {
            match self.probe_once(url.as_str()).await {
                Ok(result) => {
                    tracing::info!(
                        external_id,
                        attempt,
                        video = result.video.as_ref().and_then(|s| s.codec_name.as_deref()),
                        audio = result.audio.as_ref().and_then(|s| s.codec_name.as_deref()),
                        supported = result.is_fully_supported,
                        "Probe succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(external_id, attempt, attempts, error = %e, "Probe attempt failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.endpoint.retry_delay()).await;
                    }
                }
            }
        }

        Err(sw_core::Error::ProbeUnavailable(format!(
            "{external_id} after {attempts} attempt(s): {last_error}"
        )))
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<StreamInfo>,
}

/// Pick the first video and first audio stream and classify their codecs.
pub fn classify(streams: Vec<StreamInfo>, policy: &CodecPolicy) -> ProbeResult {
    let mut video = None;
    let mut audio = None;
    for stream in streams {
        match stream.codec_type.as_str() {
            "video" if video.is_none() => video = Some(stream),
            "audio" if audio.is_none() => audio = Some(stream),
            _ => {}
        }
    }

    let is_video_supported = supported(video.as_ref(), |c| policy.is_video_supported(c));
    let is_audio_supported = supported(audio.as_ref(), |c| policy.is_audio_supported(c));

    ProbeResult {
        video,
        audio,
        is_video_supported,
        is_audio_supported,
        is_fully_supported: is_video_supported && is_audio_supported,
    }
}

fn supported(stream: Option<&StreamInfo>, check: impl Fn(&str) -> bool) -> bool {
    stream
        .and_then(|s| s.codec_name.as_deref())
        .is_some_and(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(codec_type: &str, codec_name: &str) -> StreamInfo {
        StreamInfo {
            codec_type: codec_type.into(),
            codec_name: Some(codec_name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn classify_supported_source() {
        let result = classify(
            vec![stream("video", "h264"), stream("audio", "aac")],
            &CodecPolicy::default(),
        );
        assert!(result.is_video_supported);
        assert!(result.is_audio_supported);
        assert!(result.is_fully_supported);
    }

    #[test]
    fn classify_unsupported_video() {
        let result = classify(
            vec![stream("video", "hevc"), stream("audio", "aac")],
            &CodecPolicy::default(),
        );
        assert!(!result.is_video_supported);
        assert!(result.is_audio_supported);
        assert!(!result.is_fully_supported);
    }

    #[test]
    fn classify_takes_first_stream_of_each_type() {
        let result = classify(
            vec![
                stream("data", "bin_data"),
                stream("audio", "mp2"),
                stream("video", "H264"),
                stream("audio", "aac"),
            ],
            &CodecPolicy::default(),
        );
        assert_eq!(result.audio.unwrap().codec_name.as_deref(), Some("mp2"));
        assert!(result.is_video_supported);
        assert!(!result.is_audio_supported);
    }

    #[test]
    fn classify_missing_streams() {
        let result = classify(vec![stream("audio", "aac")], &CodecPolicy::default());
        assert!(result.video.is_none());
        assert!(!result.is_video_supported);
        assert!(result.is_audio_supported);
        assert!(!result.is_fully_supported);
    }

    #[test]
    fn parse_ffprobe_json() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_name": "h264", "codec_type": "video",
                 "width": 1920, "height": 1080, "r_frame_rate": "25/1"},
                {"index": 1, "codec_name": "aac", "codec_type": "audio",
                 "sample_rate": "48000", "channels": 2, "tags": {"language": "eng"}}
            ]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        let result = classify(parsed.streams, &CodecPolicy::default());
        let video = result.video.unwrap();
        assert_eq!(video.width, Some(1920));
        assert_eq!(result.audio.unwrap().channels, Some(2));
        assert!(result.is_fully_supported);
    }

    #[cfg(unix)]
    fn fake_ffprobe(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffprobe");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn fast_config() -> Config {
        let mut config = Config::default();
        config.probe.retry_delay_ms = 10;
        config
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_runs_ffprobe_against_probe_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let script = format!(
            "echo \"$@\" > {}\n\
             echo '{{\"streams\":[{{\"codec_type\":\"video\",\"codec_name\":\"h264\"}},{{\"codec_type\":\"audio\",\"codec_name\":\"aac\"}}]}}'",
            args_file.display()
        );
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), &script), &fast_config());

        let result = prober.probe("abc").await.unwrap();
        assert!(result.is_fully_supported);

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert!(args.contains("-show_streams"));
        assert!(args.contains("-rw_timeout 5000000"));
        assert!(args.trim_end().ends_with("http://ace_probe:6878/ace/getstream?id=abc"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_retries_then_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let count_file = dir.path().join("count");
        let script = format!("echo x >> {}\nexit 1", count_file.display());
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), &script), &fast_config());

        let err = prober.probe("dead").await.unwrap_err();
        assert!(matches!(err, sw_core::Error::ProbeUnavailable(_)));
        assert_eq!(err.http_status(), 502);

        let attempts = std::fs::read_to_string(&count_file).unwrap();
        assert_eq!(attempts.lines().count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_malformed_json_is_attempt_failure() {
        let dir = tempfile::tempdir().unwrap();
        let prober = FfprobeProber::new(fake_ffprobe(dir.path(), "echo not-json"), &fast_config());

        let err = prober.probe("abc").await.unwrap_err();
        assert!(matches!(err, sw_core::Error::ProbeUnavailable(_)));
    }
}
