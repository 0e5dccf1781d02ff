use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamwarden")]
#[command(author, version, about = "Supervisor for per-channel ffmpeg relay workers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the supervisor and its control API
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Probe an upstream source and report its codecs
    Probe {
        /// External identifier of the source
        #[arg(required = true)]
        external_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent history records
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn start_overrides_are_optional() {
        let cli = Cli::parse_from(["streamwarden", "start", "--port", "9000"]);
        match cli.command {
            Commands::Start { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected start"),
        }
    }
}
