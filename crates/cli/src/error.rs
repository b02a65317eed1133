//! Error types for CLI operations.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Socket bind error
    #[error("Failed to bind {what} on {addr}: {source}")]
    Bind {
        what: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No clients to synchronize
    #[error("No clients configured; add `clients` to the config or pass --client")]
    NoClients,

    /// Offline estimation produced no result
    #[error("No delay estimate from recordings ({client} client samples, {leader} leader samples)")]
    NoEstimate { client: usize, leader: usize },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn bind(what: &'static str, addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { what, addr, source }
    }

    /// Process exit code
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::ConfigValidation { .. } | Self::NoClients => 2,
            Self::Bind { .. } => 3,
            Self::NoEstimate { .. } => 4,
        }
    }
}

/// Exit code for any command error
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<CliError>()
        .map_or(1, CliError::exit_code)
}
