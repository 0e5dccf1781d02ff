//! Long-running relay workers.
//!
//! A worker is one ffmpeg process reading a channel's upstream source and
//! pushing it to the shared RTMP sink. Each worker leads its own process
//! group so that termination reaches any helpers it forks, and writes its
//! combined stdout/stderr to `{log_dir}/{channel}.log`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use sw_core::config::{ChannelConfig, Config, RelayConfig, SinkConfig, SourceConfig};
use sw_core::ChannelId;
use tokio::process::{Child, Command};
use url::Url;

/// How long to wait for the group to disappear after SIGKILL.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Command template
// ---------------------------------------------------------------------------

/// Build the upstream URL `http://{host}:{port}{path}?{id_param}={external_id}`.
pub fn upstream_url(
    host: &str,
    port: u16,
    source: &SourceConfig,
    external_id: &str,
) -> sw_core::Result<Url> {
    let mut url = Url::parse(&format!("http://{host}:{port}"))
        .map_err(|e| sw_core::Error::Validation(format!("invalid upstream {host}:{port}: {e}")))?;
    url.set_path(&source.path);
    url.query_pairs_mut()
        .append_pair(&source.id_param, external_id);
    Ok(url)
}

/// Build the sink URL `rtmp://{host}:{port}/{app}/{channel}`.
pub fn sink_url(sink: &SinkConfig, channel: &ChannelId) -> String {
    format!(
        "rtmp://{}:{}/{}/{}",
        sink.host,
        sink.port,
        sink.app.trim_matches('/'),
        channel
    )
}

/// Path of a channel's worker log.
pub fn log_path(log_dir: &Path, channel: &ChannelId) -> PathBuf {
    log_dir.join(format!("{channel}.log"))
}

/// The fully resolved invocation of one relay worker.
#[derive(Debug, Clone)]
pub struct RelayCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub log_path: PathBuf,
}

impl RelayCommand {
    /// Resolve the relay command for `channel` reading `external_id`.
    pub fn build(
        config: &Config,
        program: &Path,
        channel: &ChannelId,
        upstream: &ChannelConfig,
        external_id: &str,
    ) -> sw_core::Result<Self> {
        let input = upstream_url(&upstream.host, upstream.port, &config.source, external_id)?;
        let output = sink_url(&config.sink, channel);
        Ok(Self {
            program: program.to_path_buf(),
            args: relay_args(&config.relay, input.as_str(), &output),
            log_path: log_path(&config.storage.log_dir, channel),
        })
    }
}

/// Arguments of the fixed relay pipeline: read in real time, copy video,
/// re-encode audio, push FLV with a fixed keyframe interval.
pub fn relay_args(relay: &RelayConfig, input: &str, output: &str) -> Vec<String> {
    let gop = relay.gop.to_string();
    let stats_period = relay.stats_period.to_string();
    let args: &[&str] = &[
        "-hide_banner",
        "-loglevel",
        "error",
        "-stats_period",
        &stats_period,
        "-re",
        "-i",
        input,
        "-c:v",
        &relay.video_codec,
        "-c:a",
        &relay.audio_codec,
        "-b:a",
        &relay.audio_bitrate,
        "-f",
        &relay.format,
        "-flvflags",
        "no_duration_filesize",
        "-g",
        &gop,
        "-keyint_min",
        &gop,
        "-sc_threshold",
        "0",
        output,
    ];
    args.iter().map(ToString::to_string).collect()
}

/// Truncate `path` to zero length if it is larger than `max_bytes`.
///
/// Returns `true` when the file was truncated. A missing file is not an
/// error.
pub fn rotate_log(path: &Path, max_bytes: u64) -> std::io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > max_bytes => {
            OpenOptions::new().write(true).open(path)?.set_len(0)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Process handle
// ---------------------------------------------------------------------------

/// Result of stopping a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// There was no live worker to stop.
    NotRunning,
    /// The worker exited after SIGTERM.
    Terminated,
    /// The worker ignored SIGTERM and was killed.
    Killed,
    /// Signalling or reaping failed; the handle is dropped regardless.
    Unconfirmed(String),
}

impl StopOutcome {
    /// Human-readable message for the control API.
    pub fn message(&self, channel: &ChannelId) -> String {
        match self {
            StopOutcome::NotRunning => format!("Stream {channel} is not running"),
            StopOutcome::Terminated | StopOutcome::Killed | StopOutcome::Unconfirmed(_) => {
                format!("Stream {channel} stopped")
            }
        }
    }
}

/// Handle to a spawned relay worker.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: u32,
}

impl WorkerProcess {
    /// Spawn the worker as a new process-group leader with stdin closed and
    /// stdout/stderr appended to its log file.
    ///
    /// The log file is rotated first when it exceeds `log_rotate_bytes`.
    pub fn spawn(command: &RelayCommand, log_rotate_bytes: u64) -> std::io::Result<Self> {
        if let Some(parent) = command.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if rotate_log(&command.log_path, log_rotate_bytes)? {
            tracing::info!(log = %command.log_path.display(), "Rotated worker log");
        }

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&command.log_path)?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("worker exited before its pid was read"))?;

        Ok(Self { child, pid })
    }

    /// OS process id (also the process group id).
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking liveness check. A process whose status cannot be read
    /// is reported as exited.
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop the worker's process group: SIGTERM, wait up to `timeout`, then
    /// SIGKILL and a bounded reap. Never fails; problems are logged and
    /// reported through the outcome.
    pub async fn terminate(mut self, timeout: Duration) -> StopOutcome {
        if self.has_exited() {
            return StopOutcome::NotRunning;
        }

        match signal_group(self.pid, GroupSignal::Term) {
            SignalResult::Sent => {
                tracing::info!(pid = self.pid, "Sent SIGTERM to worker group");
            }
            SignalResult::Gone => {
                tracing::warn!(pid = self.pid, "Worker already gone when signalled");
                let _ = self.child.try_wait();
                return StopOutcome::NotRunning;
            }
            SignalResult::Failed(e) => {
                tracing::error!(pid = self.pid, error = %e, "Failed to signal worker group");
            }
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = self.pid, %status, "Worker exited");
                return StopOutcome::Terminated;
            }
            Ok(Err(e)) => {
                tracing::error!(pid = self.pid, error = %e, "Failed to wait for worker");
                return StopOutcome::Unconfirmed(e.to_string());
            }
            Err(_) => {
                tracing::warn!(
                    pid = self.pid,
                    "Worker still running after {timeout:?}; sending SIGKILL"
                );
            }
        }

        if let SignalResult::Failed(e) = signal_group(self.pid, GroupSignal::Kill) {
            tracing::error!(pid = self.pid, error = %e, "Failed to kill worker group");
        }
        let _ = self.child.start_kill();

        match tokio::time::timeout(KILL_REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(_)) => StopOutcome::Killed,
            Ok(Err(e)) => StopOutcome::Unconfirmed(e.to_string()),
            Err(_) => StopOutcome::Unconfirmed("worker did not exit after SIGKILL".into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

#[derive(Debug)]
enum SignalResult {
    Sent,
    Gone,
    Failed(String),
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) -> SignalResult {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = match signal {
        GroupSignal::Term => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => SignalResult::Sent,
        Err(Errno::ESRCH) => SignalResult::Gone,
        Err(e) => SignalResult::Failed(e.to_string()),
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) -> SignalResult {
    SignalResult::Failed("process groups are not supported on this platform".into())
}
