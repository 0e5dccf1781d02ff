mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use sw_av::tools::FFPROBE;
use sw_av::{FfprobeProber, Prober, ToolRegistry};
use sw_core::config::Config;
use sw_core::HistoryEvent;
use sw_store::ledger::DEFAULT_TAIL;
use sw_store::Ledger;

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => Ok(Config::load(p)?),
        None => Ok(Config::default()),
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        channels = config.channels.len(),
        "Starting streamwarden on {}:{}",
        config.server.host,
        config.server.port
    );

    sw_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamwarden=trace,sw_server=trace,sw_av=debug,sw_store=debug,sw_core=debug,tower_http=debug".to_string()
        } else {
            "streamwarden=info,sw_server=info,sw_av=info,sw_store=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { external_id, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_source(&external_id, cli.config.as_deref(), json))
        }
        Commands::History { limit } => show_history(cli.config.as_deref(), limit),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamwarden {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_source(external_id: &str, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require(FFPROBE)?.to_path_buf();
    let prober = FfprobeProber::new(ffprobe, &config);

    let result = prober.probe(external_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Source: {external_id}");
    match result.video {
        Some(ref stream) => {
            print!("Video: {}", stream.codec_name.as_deref().unwrap_or("unknown"));
            if let (Some(w), Some(h)) = (stream.width, stream.height) {
                print!(" {w}x{h}");
            }
            if let Some(ref rate) = stream.r_frame_rate {
                print!(" @ {rate}");
            }
            println!();
        }
        None => println!("Video: none"),
    }
    match result.audio {
        Some(ref stream) => {
            print!("Audio: {}", stream.codec_name.as_deref().unwrap_or("unknown"));
            if let Some(ch) = stream.channels {
                print!(" {ch}ch");
            }
            if let Some(ref rate) = stream.sample_rate {
                print!(" {rate} Hz");
            }
            println!();
        }
        None => println!("Audio: none"),
    }

    println!();
    println!("Video supported: {}", result.is_video_supported);
    println!("Audio supported: {}", result.is_audio_supported);
    if result.is_fully_supported {
        println!("✓ Source can be relayed");
    } else {
        println!("✗ Source uses unsupported codecs");
    }

    Ok(())
}

fn show_history(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let ledger = Ledger::new(&config.storage.history_file);
    let records = ledger.tail(limit.min(DEFAULT_TAIL))?;

    if records.is_empty() {
        println!("No history recorded in {}", ledger.path().display());
        return Ok(());
    }

    for record in &records {
        print!(
            "{}  {:<6} {:<6} {}",
            record.time.format("%Y-%m-%d %H:%M:%S"),
            match record.event {
                HistoryEvent::Start => "start",
                HistoryEvent::Stop => "stop",
            },
            record.channel,
            record.external_id
        );
        if let Some(ref title) = record.title {
            print!(" \"{title}\"");
        }
        if let Some(secs) = record.duration {
            print!(" ({:02}:{:02}:{:02})", secs / 3600, (secs / 60) % 60, secs % 60);
        }
        println!();
    }

    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all().await {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to relay and probe streams.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Channels: {}", config.channels.len());
    for channel in &config.channels {
        println!("    {} -> {}:{}", channel.name, channel.host, channel.port);
    }
    println!("  Probe: {}:{}", config.probe.host, config.probe.port);
    println!(
        "  Sink: rtmp://{}:{}/{}",
        config.sink.host, config.sink.port, config.sink.app
    );
    println!("  State file: {}", config.storage.state_file.display());
    println!("  History file: {}", config.storage.history_file.display());

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
