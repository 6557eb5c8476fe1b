//! meetlink CLI - SDP munging and signaling sessions from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod sdp;
mod session;

use config::CliConfig;
use sdp::SdpTransforms;

/// meetlink - conferencing signaling client and SDP toolkit
#[derive(Parser)]
#[command(name = "meetlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "MEETLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply transforms to an SDP file and print the result
    Sdp {
        /// SDP file
        file: PathBuf,

        /// Cap the Opus average bitrate (bps)
        #[arg(long)]
        max_audio_bitrate: Option<f64>,

        /// Enable Opus stereo
        #[arg(long)]
        stereo: bool,

        /// Remove H.264 from the video send section
        #[arg(long)]
        remove_h264: bool,

        /// Video bandwidth limit (kbps)
        #[arg(long)]
        bandwidth_kbps: Option<u32>,

        /// Use TIAS instead of AS for the bandwidth limit
        #[arg(long)]
        firefox: bool,

        /// Move H.264 to the front of the video send section
        #[arg(long)]
        prefer_h264: bool,

        /// Drop server reflexive candidates
        #[arg(long)]
        strip_srflx: bool,

        /// Generate SSRCs for this many simulcast layers
        #[arg(long)]
        simulcast: Option<usize>,

        /// Starting video send bitrate (kbps)
        #[arg(long)]
        start_bitrate_kbps: Option<u32>,
    },

    /// Show media sections and candidate information of an SDP file
    SdpInfo {
        /// SDP file
        file: PathBuf,
    },

    /// Open a signaling session, join, and keep it alive until Ctrl+C
    ///
    /// The server must speak the meetlink frame encoding.
    Connect {
        /// Signaling URL (wss://...)
        #[arg(short, long)]
        url: String,

        /// Join token
        #[arg(short, long, env = "MEETLINK_JOIN_TOKEN")]
        token: String,

        /// Ping interval (ms), overrides the config file
        #[arg(long)]
        ping_interval_ms: Option<u64>,

        /// Ask the server for bitrate updates
        #[arg(long)]
        send_bitrates: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Sdp {
            file,
            max_audio_bitrate,
            stereo,
            remove_h264,
            bandwidth_kbps,
            firefox,
            prefer_h264,
            strip_srflx,
            simulcast,
            start_bitrate_kbps,
        } => {
            let transforms = SdpTransforms {
                strip_srflx,
                remove_h264,
                prefer_h264,
                bandwidth_kbps,
                firefox,
                start_bitrate_kbps,
                simulcast,
                max_audio_bitrate,
                stereo,
            };
            sdp::run_sdp(&file, &transforms)?;
        }

        Commands::SdpInfo { file } => {
            sdp::run_sdp_info(&file)?;
        }

        Commands::Connect {
            url,
            token,
            ping_interval_ms,
            send_bitrates,
        } => {
            let mut config = CliConfig::load(cli.config.as_deref())?;
            if let Some(ms) = ping_interval_ms {
                config.signaling.ping_pong_interval_ms = ms;
            }
            if send_bitrates {
                config.signaling.send_bitrates = true;
            }
            config.signaling.validate()?;

            // Handle Ctrl+C
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal");
                    let _ = shutdown_tx.send(()).await;
                }
            });

            session::run_connect(&url, &token, &config, &mut shutdown_rx).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    // logs go to stderr; stdout carries SDP and frames
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
