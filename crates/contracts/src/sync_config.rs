//! Synchronization configuration tree

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ClientAddress;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Static membership used by the leader heartbeat
    #[serde(default)]
    pub clients: Vec<ClientAddress>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub imu: ImuSyncConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Ports and bind address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Clock exchange datagrams (client listens)
    #[serde(default = "default_exchange_port")]
    pub exchange_port: u16,

    /// Offset update control messages (client listens)
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Recording control datagrams (client listens) and file transfer (leader listens)
    #[serde(default = "default_imu_port")]
    pub imu_port: u16,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_exchange_port() -> u16 {
    9428
}

fn default_rpc_port() -> u16 {
    8244
}

fn default_imu_port() -> u16 {
    9429
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            exchange_port: default_exchange_port(),
            rpc_port: default_rpc_port(),
            imu_port: default_imu_port(),
        }
    }
}

/// Clock exchange tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Max rounds per exchange
    #[serde(default = "default_num_cycles")]
    pub num_cycles: u32,

    /// Per-round receive timeout (ms)
    #[serde(default = "default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,

    /// Early-exit latency threshold (ns)
    #[serde(default = "default_min_round_trip_latency_ns")]
    pub min_round_trip_latency_ns: i64,

    /// Timeouts tolerated before the exchange is abandoned
    #[serde(default = "default_missing_message_budget")]
    pub missing_message_budget: u32,
}

fn default_num_cycles() -> u32 {
    100
}

fn default_socket_timeout_ms() -> u64 {
    500
}

fn default_min_round_trip_latency_ns() -> i64 {
    1_000_000
}

fn default_missing_message_budget() -> u32 {
    10
}

impl ExchangeConfig {
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            num_cycles: default_num_cycles(),
            socket_timeout_ms: default_socket_timeout_ms(),
            min_round_trip_latency_ns: default_min_round_trip_latency_ns(),
            missing_message_budget: default_missing_message_budget(),
        }
    }
}

/// Signal-based synchronization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuSyncConfig {
    /// Interpolate both traces onto a uniform grid before correlating
    #[serde(default = "default_resample")]
    pub resample: bool,

    /// Upper bound of the grid step is `1 / resample_rate_hz`
    #[serde(default = "default_resample_rate_hz")]
    pub resample_rate_hz: f64,

    /// Restrict the lag search to `|lag| <= max_lag_seconds`
    #[serde(default)]
    pub max_lag_seconds: Option<f64>,

    /// Fixed recording window (ms)
    #[serde(default = "default_recording_window_ms")]
    pub recording_window_ms: u64,

    /// Wait for the client's recording upload (ms)
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,

    /// Where recordings and received files are stored
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,
}

fn default_resample() -> bool {
    true
}

fn default_resample_rate_hz() -> f64 {
    1.0
}

fn default_recording_window_ms() -> u64 {
    10_000
}

fn default_transfer_timeout_ms() -> u64 {
    30_000
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("local_sensors")
}

impl ImuSyncConfig {
    pub fn recording_window(&self) -> Duration {
        Duration::from_millis(self.recording_window_ms)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}

impl Default for ImuSyncConfig {
    fn default() -> Self {
        Self {
            resample: default_resample(),
            resample_rate_hz: default_resample_rate_hz(),
            max_lag_seconds: None,
            recording_window_ms: default_recording_window_ms(),
            transfer_timeout_ms: default_transfer_timeout_ms(),
            recordings_dir: default_recordings_dir(),
        }
    }
}

/// Which engine the leader schedules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    #[default]
    Exchange,
    Imu,
}

/// Scheduler and heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub strategy: SyncStrategy,

    /// Bounded wait for in-flight work on close (ms)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Interval between submits of every known client (ms)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}

impl SchedulerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::default(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}
