//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which writes fake `ffmpeg`/`ffprobe` scripts
//! into a temp directory, points every storage path there, and builds a
//! full [`AppContext`]. The [`TestHarness::with_server`] constructor starts
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sw_core::config::Config;
use sw_core::HistoryRecord;
use sw_server::context::AppContext;
use sw_server::router::build_router;
use tempfile::TempDir;

/// Relay stand-in: prints its arguments to the channel log and idles.
pub const FAKE_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-test"
  exit 0
fi
echo "$@"
exec sleep 30
"#;

/// Probe stand-in: the answer depends on the external id in the URL.
/// `hevc*` ids report an HEVC source, `missing*` ids fail, anything else is
/// H.264 with AAC.
pub const FAKE_FFPROBE: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffprobe version 6.1-test"
  exit 0
fi
for last; do :; done
case "$last" in
  *id=missing*)
    exit 1
    ;;
  *id=hevc*)
    cat <<'JSON'
{"streams": [
  {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160},
  {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2}
]}
JSON
    ;;
  *)
    cat <<'JSON'
{"streams": [
  {"index": 0, "codec_type": "video", "codec_name": "h264", "profile": "High", "width": 1920, "height": 1080, "r_frame_rate": "25/1"},
  {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2, "sample_rate": "48000"}
]}
JSON
    ;;
esac
"#;

/// Test harness wrapping a fully-constructed [`AppContext`] whose files all
/// live under a temp directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with test configuration.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a new harness, letting the caller adjust the test config.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = test_config(dir.path());
        adjust(&mut config);
        Self::from_parts(dir, config)
    }

    /// Build a harness over an existing directory, e.g. to simulate a
    /// process restart.
    pub fn from_parts(dir: TempDir, config: Config) -> Self {
        let ctx = AppContext::new(config);
        Self { ctx, dir }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.serve().await;
        (harness, addr)
    }

    /// Serve this harness's router on a random port.
    pub async fn serve(&self) -> SocketAddr {
        let app = build_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Pid of the worker attached to `channel`, if any.
    pub fn pid(&self, channel: &str) -> Option<u32> {
        let id = self.ctx.state.resolve(channel).ok()?;
        let slot = self.ctx.state.slot(&id).ok()?;
        let state = slot.state();
        state.worker.as_ref().map(|w| w.pid())
    }

    /// Contents of the channel's worker log.
    pub fn worker_log(&self, channel: &str) -> String {
        let path = self
            .ctx
            .config
            .storage
            .log_dir
            .join(format!("{channel}.log"));
        std::fs::read_to_string(path).unwrap_or_default()
    }

    /// All ledger records, newest first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.ctx.ledger.tail(usize::MAX).expect("failed to read ledger")
    }

    /// Stop every worker so no `sleep` process outlives the test.
    pub async fn shutdown(&self) {
        self.ctx.supervisor.shutdown().await;
    }
}

/// Config with storage, tools and timings suited to tests.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.state_file = dir.join("data/state.json");
    config.storage.history_file = dir.join("data/history.jsonl");
    config.storage.log_dir = dir.join("logs");
    config.tools.ffmpeg_path = Some(write_script(dir, "ffmpeg", FAKE_FFMPEG));
    config.tools.ffprobe_path = Some(write_script(dir, "ffprobe", FAKE_FFPROBE));
    config.probe.retries = 2;
    config.probe.retry_delay_ms = 10;
    config.probe.timeout_secs = 5;
    config.supervisor.stop_timeout_secs = 2;
    config.supervisor.health_interval_ms = 100;
    config
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

/// Poll `check` until it holds or about five seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Whether a process with `pid` exists and is not a zombie.
pub fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}
