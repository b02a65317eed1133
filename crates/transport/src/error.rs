//! Transport error types

use contracts::ContractError;
use thiserror::Error;

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Datagram of the wrong size
    #[error("{what}: expected {expected} bytes, got {actual}")]
    BadLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Control payload does not fit the fixed buffer
    #[error("control payload of {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Control payload is not UTF-8
    #[error("control payload is not valid utf-8")]
    BadPayload,

    /// File header length out of range
    #[error("file header of {size} bytes exceeds {max}")]
    HeaderTooLarge { size: u32, max: u32 },

    /// File header is not a valid `FileDetails`
    #[error("invalid file header: {0}")]
    BadHeader(#[from] serde_json::Error),

    /// Stream ended before the announced size
    #[error("file '{name}' truncated: expected {expected} bytes, got {received}")]
    Truncated {
        name: String,
        expected: u64,
        received: u64,
    },

    /// Path without a usable file name
    #[error("invalid file name '{0}'")]
    BadFileName(String),

    /// Recorder failure while serving a recording request
    #[error("recorder error: {0}")]
    Recorder(#[from] ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for ContractError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Recorder(inner) => inner,
            TransportError::Io(io) => ContractError::Io(io),
            e @ (TransportError::BadLength { .. }
            | TransportError::PayloadTooLarge { .. }
            | TransportError::BadPayload) => ContractError::malformed("control message", e.to_string()),
            other => ContractError::Other(other.to_string()),
        }
    }
}
