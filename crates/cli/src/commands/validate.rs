//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SyncConfig, SyncStrategy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    strategy: SyncStrategy,
    client_count: usize,
    bind_address: String,
    exchange_port: u16,
    rpc_port: u16,
    imu_port: u16,
    num_cycles: u32,
    heartbeat_interval_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                strategy: config.scheduler.strategy,
                client_count: config.clients.len(),
                bind_address: config.network.bind_address.to_string(),
                exchange_port: config.network.exchange_port,
                rpc_port: config.network.rpc_port,
                imu_port: config.network.imu_port,
                num_cycles: config.exchange.num_cycles,
                heartbeat_interval_ms: config.scheduler.heartbeat_interval_ms,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SyncConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.clients.is_empty() {
        warnings.push("No clients configured - leader needs --client to run".to_string());
    }

    // worst case: every round waits for the full timeout
    let exchange_worst_ms = u64::from(config.exchange.num_cycles) * config.exchange.socket_timeout_ms;
    match config.scheduler.strategy {
        SyncStrategy::Exchange if exchange_worst_ms > config.scheduler.heartbeat_interval_ms => {
            warnings.push(format!(
                "A slow exchange can take up to {exchange_worst_ms} ms, longer than the {} ms heartbeat",
                config.scheduler.heartbeat_interval_ms
            ));
        }
        SyncStrategy::Imu
            if config.imu.recording_window_ms >= config.scheduler.heartbeat_interval_ms =>
        {
            warnings.push(format!(
                "Recording window ({} ms) is not shorter than the heartbeat ({} ms)",
                config.imu.recording_window_ms, config.scheduler.heartbeat_interval_ms
            ));
        }
        _ => {}
    }

    if config.imu.max_lag_seconds.is_none() && config.scheduler.strategy == SyncStrategy::Imu {
        warnings.push("imu.max_lag_seconds is unset - lag search covers the whole recording".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Strategy: {:?}", summary.strategy);
            println!("  Clients: {}", summary.client_count);
            println!(
                "  Ports: exchange {}, rpc {}, imu {} (bind {})",
                summary.exchange_port, summary.rpc_port, summary.imu_port, summary.bind_address
            );
            println!("  Exchange rounds: {}", summary.num_cycles);
            println!("  Heartbeat: {} ms", summary.heartbeat_interval_ms);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
