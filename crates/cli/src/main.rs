//! `rtc-conductor` command-line harness
//!
//! # Usage
//!
//! ```bash
//! # Audio call between two in-process conductors
//! rtc-conductor loopback --stun stun.l.google.com:19302
//!
//! # Video, without rendering, DTLS constraint off
//! rtc-conductor loopback --video --monitor --no-dtls --duration 10
//!
//! # Validate a configuration file (RTC_* variables are read otherwise)
//! rtc-conductor check-config --config conductor.json
//! ```

mod loopback;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rtc_conductor_core::config::DEFAULT_ICE_PORT;
use rtc_conductor_core::ConductorConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::loopback::LoopbackOptions;

/// RTC session conductor
///
/// Drives WebRTC sessions whose signaling is relayed by an external channel.
#[derive(Parser, Debug)]
#[command(name = "rtc-conductor", author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "RTC_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call between two in-process conductors over a loopback relay
    Loopback(LoopbackArgs),
    /// Validate a configuration and print the ICE servers it resolves to
    CheckConfig(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file; RTC_* environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reflection server as host[:port]
    #[arg(long)]
    stun: Option<String>,

    /// Ask for sessions without DTLS-SRTP key agreement
    #[arg(long)]
    no_dtls: bool,
}

#[derive(Args, Debug)]
struct LoopbackArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Send video from a synthetic camera
    #[arg(long)]
    video: bool,

    /// Monitor mode: nothing is rendered
    #[arg(long)]
    monitor: bool,

    /// Seconds to hold the call once both sides are active
    #[arg(long, default_value_t = 5)]
    duration: u64,

    /// Seconds to wait for both sides to become active
    #[arg(long, default_value_t = 15)]
    timeout: u64,
}

impl ConfigArgs {
    fn load(&self) -> Result<ConductorConfig> {
        let mut config = match &self.config {
            Some(path) => load_file(path)?,
            None => ConductorConfig::from_env()?,
        };

        if let Some(stun) = &self.stun {
            let (host, port) = split_host_port(stun)?;
            config = config.with_stun_server(host, port);
        }
        if self.no_dtls {
            config = config.with_dtls(false);
        }

        config.validate()?;
        Ok(config)
    }
}

fn split_host_port(value: &str) -> Result<(&str, u16)> {
    match value.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in '{}'", value))?;
            Ok((host, port))
        }
        None => Ok((value, DEFAULT_ICE_PORT)),
    }
}

fn load_file(path: &Path) -> Result<ConductorConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ConductorConfig::from_json_str(&json)?)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn check_config(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let servers: Vec<_> = config
        .ice_servers()
        .into_iter()
        .map(|server| {
            serde_json::json!({
                "uri": server.uri,
                "relay": server.is_relay(),
                "authenticated": server.username.is_some(),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "ice_servers": servers,
        "video_capture_device": config.video_capture_device,
        "dtls_enabled": config.dtls_enabled,
        "stream_label": config.stream_label,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    info!("rtc-conductor {}", rtc_conductor_core::VERSION);

    match cli.command {
        Command::Loopback(args) => {
            let config = args.config.load()?;
            let options = LoopbackOptions {
                video: args.video,
                monitor: args.monitor,
                duration: Duration::from_secs(args.duration),
                timeout: Duration::from_secs(args.timeout),
            };
            loopback::run(config, options).await
        }
        Command::CheckConfig(args) => check_config(&args),
    }
}
