//! Layered error definitions
//!
//! Categorized by source: config / network / recording / data

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Client address could not be parsed
    #[error("invalid client address '{input}': {message}")]
    InvalidAddress { input: String, message: String },

    // ===== Network Errors =====
    /// Datagram or stream socket failure
    #[error("network error with '{peer}': {message}")]
    Network { peer: String, message: String },

    /// Malformed wire message
    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },

    // ===== Recording Errors =====
    /// Gyroscope recorder failure
    #[error("recording error: {message}")]
    Recording { message: String },

    // ===== Data Errors =====
    /// Signal series with mismatched columns
    #[error("signal series mismatch: {timestamps} timestamps vs {samples} samples")]
    SeriesMismatch { timestamps: usize, samples: usize },

    /// Signal series with decreasing timestamps
    #[error("signal series not time-ascending at index {index}")]
    SeriesOrder { index: usize },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create network error
    pub fn network(peer: impl ToString, message: impl Into<String>) -> Self {
        Self::Network {
            peer: peer.to_string(),
            message: message.into(),
        }
    }

    /// Create malformed message error
    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create recording error
    pub fn recording(message: impl Into<String>) -> Self {
        Self::Recording {
            message: message.into(),
        }
    }
}
