use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rangedesk")]
#[command(about = "RangeDesk - Real-time market analytics for range contracts")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Log output format; overrides `service.log_format`
    #[arg(long, global = true, value_enum, env = "RANGEDESK_LOG_FORMAT")]
    pub log_format: Option<LogFormatArg>,

    /// Default log filter when RUST_LOG is unset; overrides `service.log_level`
    #[arg(long, global = true, env = "RANGEDESK_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines event file through the analytics core
    Replay {
        /// Path to the configuration file
        #[arg(short, long, default_value = "rangedesk.yaml")]
        config: PathBuf,

        /// JSON-lines file with one feed event per line
        #[arg(short, long)]
        input: PathBuf,

        /// Which snapshots to print when the replay finishes
        #[arg(short, long, value_enum, default_value = "all")]
        output: SnapshotKind,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate configuration without replaying anything
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "rangedesk.yaml")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "rangedesk.yaml")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Every snapshot, keyed by feed
    All,
    /// Price series and volatility
    Price,
    /// Depth curve and recent trades
    Depth,
    /// Options chain analytics
    Options,
    /// Positions, PnL and bands
    Dashboard,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
