//! Unified error type for streamwarden.
//!
//! Every crate funnels its failures into [`Error`], which carries enough
//! context for API handlers to derive an HTTP status code via
//! [`Error::http_status`].

/// Unified error type covering all failure modes of the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel name is not part of the configured channel set.
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    /// A required request field was absent or empty.
    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A worker process could not be created.
    #[error("Failed to start {channel}: {message}")]
    SpawnFailure {
        /// Channel whose worker failed to spawn.
        channel: String,
        /// Human-readable error description.
        message: String,
    },

    /// The source could not be inspected, even after retries.
    #[error("Source unavailable: {0}")]
    ProbeUnavailable(String),

    /// Writing the snapshot or the history ledger failed.
    #[error("Persistence error [{target}]: {message}")]
    Persistence {
        /// What was being written ("snapshot", "ledger").
        target: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidChannel(_) => 400,
            Error::MissingParameter(_) => 400,
            Error::Validation(_) => 400,
            Error::SpawnFailure { .. } => 500,
            Error::ProbeUnavailable(_) => 502,
            Error::Persistence { .. } => 500,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidChannel(_) => "invalid_channel",
            Error::MissingParameter(_) => "missing_parameter",
            Error::Validation(_) => "validation_error",
            Error::SpawnFailure { .. } => "spawn_failure",
            Error::ProbeUnavailable(_) => "probe_unavailable",
            Error::Persistence { .. } => "persistence_error",
            Error::Io { .. } => "io_error",
            Error::Tool { .. } => "tool_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::SpawnFailure`].
    pub fn spawn_failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SpawnFailure {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Persistence`].
    pub fn persistence(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Persistence {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_channel_display() {
        let err = Error::InvalidChannel("ch9".into());
        assert_eq!(err.to_string(), "Invalid channel: ch9");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "invalid_channel");
    }

    #[test]
    fn missing_parameter_display() {
        let err = Error::MissingParameter("external_id".into());
        assert_eq!(err.to_string(), "Missing parameter 'external_id'");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn spawn_failure_is_server_error() {
        let err = Error::spawn_failure("ch1", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to start ch1: No such file or directory"
        );
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn probe_unavailable_display() {
        let err = Error::ProbeUnavailable("gave up after 2 attempts".into());
        assert_eq!(err.http_status(), 502);
        assert_eq!(err.code(), "probe_unavailable");
    }

    #[test]
    fn persistence_display() {
        let err = Error::persistence("snapshot", "disk full");
        assert_eq!(err.to_string(), "Persistence error [snapshot]: disk full");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffprobe", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffprobe]: exit code 1");
        assert_eq!(err.http_status(), 502);
    }
}
