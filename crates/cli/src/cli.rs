//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// AirSim Bridge - republish simulator sensors on a message bus
#[derive(Parser, Debug)]
#[command(
    name = "airsim-bridge",
    author,
    version,
    about = "AirSim sensor bridge",
    long_about = "Polls an AirSim simulator for camera, LIDAR, IMU and pose data and\n\
                  republishes it on an in-process message bus, fanned out to the \n\
                  configured sinks. Relays velocity commands back to the vehicle."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AIRSIM_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "AIRSIM_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display resolved configuration, request batch and slot table
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "bridge.toml",
        env = "AIRSIM_BRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override simulator host from configuration
    #[arg(long, env = "AIRSIM_HOST")]
    pub host: Option<String>,

    /// Override simulator RPC port from configuration
    #[arg(long, env = "AIRSIM_PORT")]
    pub port: Option<u16>,

    /// Stop after this many main-loop ticks (0 = unlimited)
    #[arg(long, default_value = "0", env = "AIRSIM_BRIDGE_MAX_TICKS")]
    pub max_ticks: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "AIRSIM_BRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "AIRSIM_BRIDGE_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Use the built-in mock simulator instead of a live connection
    #[arg(long)]
    pub mock: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "bridge.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every output and input topic
    #[arg(long)]
    pub topics: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
