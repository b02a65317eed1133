//! Command implementations.

mod client;
mod estimate;
mod leader;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::SyncConfig;
use tracing::{error, info};

use crate::error::CliError;

pub use client::run_client;
pub use estimate::run_estimate;
pub use leader::run_leader;
pub use validate::run_validate;

/// Load and validate the configuration file
fn load_config(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    let config = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    info!(
        config = %path.display(),
        clients = config.clients.len(),
        strategy = ?config.scheduler.strategy,
        "Configuration loaded"
    );
    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
