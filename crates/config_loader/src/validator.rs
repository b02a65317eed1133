//! 配置校验模块
//!
//! 校验规则：
//! - clients 唯一
//! - 各 UDP 通道端口互不冲突且非 0
//! - exchange 轮数 / 超时 / 丢包预算 > 0
//! - resample_rate_hz 为有限正数
//! - 录制窗口与传输超时 > 0

use std::collections::HashSet;

use contracts::{ContractError, ExchangeConfig, ImuSyncConfig, NetworkConfig, SyncConfig};

/// 校验 SyncConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &SyncConfig) -> Result<(), ContractError> {
    validate_clients(config)?;
    validate_network(&config.network)?;
    validate_exchange(&config.exchange)?;
    validate_imu(&config.imu)?;
    validate_scheduler(config)?;
    Ok(())
}

/// 校验 client 地址唯一性
fn validate_clients(config: &SyncConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for client in &config.clients {
        if !seen.insert(client) {
            return Err(ContractError::config_validation(
                format!("clients[{client}]"),
                "duplicate client address",
            ));
        }
    }
    Ok(())
}

/// 校验端口
fn validate_network(network: &NetworkConfig) -> Result<(), ContractError> {
    let ports = [
        ("network.exchange_port", network.exchange_port),
        ("network.rpc_port", network.rpc_port),
        ("network.imu_port", network.imu_port),
    ];

    let mut seen = HashSet::new();
    for (field, port) in ports {
        if port == 0 {
            return Err(ContractError::config_validation(field, "port must be > 0"));
        }
        if !seen.insert(port) {
            return Err(ContractError::config_validation(
                field,
                format!("port {port} is used by another channel"),
            ));
        }
    }
    Ok(())
}

/// 校验 clock exchange 参数
fn validate_exchange(exchange: &ExchangeConfig) -> Result<(), ContractError> {
    if exchange.num_cycles == 0 {
        return Err(ContractError::config_validation(
            "exchange.num_cycles",
            "must be > 0",
        ));
    }
    if exchange.socket_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "exchange.socket_timeout_ms",
            "must be > 0",
        ));
    }
    if exchange.min_round_trip_latency_ns <= 0 {
        return Err(ContractError::config_validation(
            "exchange.min_round_trip_latency_ns",
            format!("must be > 0, got {}", exchange.min_round_trip_latency_ns),
        ));
    }
    if exchange.missing_message_budget == 0 {
        return Err(ContractError::config_validation(
            "exchange.missing_message_budget",
            "must be > 0",
        ));
    }
    Ok(())
}

/// 校验信号同步参数
fn validate_imu(imu: &ImuSyncConfig) -> Result<(), ContractError> {
    if !imu.resample_rate_hz.is_finite() || imu.resample_rate_hz <= 0.0 {
        return Err(ContractError::config_validation(
            "imu.resample_rate_hz",
            format!("must be a positive number, got {}", imu.resample_rate_hz),
        ));
    }
    if let Some(max_lag) = imu.max_lag_seconds {
        if !max_lag.is_finite() || max_lag <= 0.0 {
            return Err(ContractError::config_validation(
                "imu.max_lag_seconds",
                format!("must be a positive number, got {max_lag}"),
            ));
        }
    }
    if imu.recording_window_ms == 0 {
        return Err(ContractError::config_validation(
            "imu.recording_window_ms",
            "must be > 0",
        ));
    }
    if imu.transfer_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "imu.transfer_timeout_ms",
            "must be > 0",
        ));
    }
    if imu.recordings_dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "imu.recordings_dir",
            "must not be empty",
        ));
    }
    Ok(())
}

/// 校验调度参数
fn validate_scheduler(config: &SyncConfig) -> Result<(), ContractError> {
    if config.scheduler.heartbeat_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "scheduler.heartbeat_interval_ms",
            "must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let result = validate(&SyncConfig::default());
        assert!(result.is_ok(), "Failed: {:?}", result.err());
    }

    #[test]
    fn test_duplicate_client() {
        let mut config = SyncConfig::default();
        let client = "10.0.0.9".parse().unwrap();
        config.clients = vec![client, client];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_port_collision() {
        let mut config = SyncConfig::default();
        config.network.rpc_port = config.network.exchange_port;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("network.rpc_port"));
    }

    #[test]
    fn test_zero_port() {
        let mut config = SyncConfig::default();
        config.network.imu_port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_cycles() {
        let mut config = SyncConfig::default();
        config.exchange.num_cycles = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("num_cycles"));
    }

    #[test]
    fn test_zero_budget() {
        let mut config = SyncConfig::default();
        config.exchange.missing_message_budget = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_latency_threshold() {
        let mut config = SyncConfig::default();
        config.exchange.min_round_trip_latency_ns = -5;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("-5"));
    }

    #[test]
    fn test_invalid_resample_rate() {
        let mut config = SyncConfig::default();
        config.imu.resample_rate_hz = f64::NAN;
        assert!(validate(&config).is_err());

        config.imu.resample_rate_hz = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_max_lag() {
        let mut config = SyncConfig::default();
        config.imu.max_lag_seconds = Some(0.0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_recording_window() {
        let mut config = SyncConfig::default();
        config.imu.recording_window_ms = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("recording_window_ms"));
    }
}
