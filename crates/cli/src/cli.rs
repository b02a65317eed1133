//! CLI argument definitions using clap.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{ClientAddress, SyncStrategy};

/// capture-sync - leader/client clock synchronization
#[derive(Parser, Debug)]
#[command(
    name = "capture-sync",
    author,
    version,
    about = "Leader/client clock synchronization over UDP or gyroscope correlation",
    long_about = "Synchronizes client device clocks to a leader.\n\n\
                  The leader measures each client's offset with a UDP round-trip \n\
                  exchange or by correlating gyroscope recordings, then pushes the \n\
                  aligned offset back to the client."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CAPTURE_SYNC_VERBOSE")]
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
        env = "CAPTURE_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "CAPTURE_SYNC_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the leader: heartbeat, scheduler and sync engine
    Leader(LeaderArgs),

    /// Run a client: exchange responder and control listeners
    Client(ClientArgs),

    /// Estimate the offset between two gyroscope recordings offline
    Estimate(EstimateArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct LeaderArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CAPTURE_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Override the sync strategy from configuration
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Additional client address (repeatable)
    #[arg(long = "client")]
    pub clients: Vec<ClientAddress>,

    /// Override the bind address from configuration
    #[arg(long, env = "CAPTURE_SYNC_BIND")]
    pub bind: Option<IpAddr>,

    /// Stop after this many heartbeats (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    pub heartbeats: u64,

    /// Replay this recording instead of the mock gyroscope (imu strategy)
    #[arg(long)]
    pub recording: Option<PathBuf>,

    /// Print sync events as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ClientArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "CAPTURE_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Override the bind address from configuration
    #[arg(long, env = "CAPTURE_SYNC_BIND")]
    pub bind: Option<IpAddr>,

    /// Replay this recording instead of the mock gyroscope
    #[arg(long)]
    pub recording: Option<PathBuf>,

    /// Mock gyroscope sampling rate (Hz)
    #[arg(long, default_value = "200")]
    pub mock_rate_hz: f64,
}

#[derive(Parser, Debug, Clone)]
pub struct EstimateArgs {
    /// Client recording (`x,y,z,t_ns` CSV)
    #[arg(long)]
    pub client: PathBuf,

    /// Leader recording (`x,y,z,t_ns` CSV)
    #[arg(long)]
    pub leader: PathBuf,

    /// Correlate raw samples instead of a resampled grid
    #[arg(long)]
    pub no_resample: bool,

    /// Upper bound of the grid step is 1 / rate
    #[arg(long, default_value = "1.0")]
    pub rate_hz: f64,

    /// Restrict the lag search (seconds)
    #[arg(long)]
    pub max_lag: Option<f64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    /// UDP round-trip exchange
    Exchange,
    /// Gyroscope recording correlation
    Imu,
}

impl From<StrategyArg> for SyncStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Exchange => SyncStrategy::Exchange,
            StrategyArg::Imu => SyncStrategy::Imu,
        }
    }
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
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_leader_args() {
        let cli = Cli::parse_from([
            "capture-sync",
            "leader",
            "--config",
            "sync.toml",
            "--strategy",
            "imu",
            "--client",
            "10.0.0.2",
            "--client",
            "10.0.0.3",
            "--heartbeats",
            "3",
        ]);
        let Commands::Leader(args) = cli.command else {
            panic!("expected leader command");
        };
        assert_eq!(args.config, PathBuf::from("sync.toml"));
        assert_eq!(args.strategy, Some(StrategyArg::Imu));
        assert_eq!(args.clients.len(), 2);
        assert_eq!(args.heartbeats, 3);
    }

    #[test]
    fn test_estimate_args() {
        let cli = Cli::parse_from([
            "capture-sync",
            "-v",
            "estimate",
            "--client",
            "a.csv",
            "--leader",
            "b.csv",
            "--no-resample",
            "--json",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Estimate(args) = cli.command else {
            panic!("expected estimate command");
        };
        assert!(args.no_resample);
        assert_eq!(args.rate_hz, 1.0);
        assert!(args.json);
    }

    #[test]
    fn test_bad_client_address_is_rejected() {
        let result = Cli::try_parse_from(["capture-sync", "leader", "--client", "not-an-ip"]);
        assert!(result.is_err());
    }
}
