//! Signal-based sync errors

use std::io;
use std::net::SocketAddr;

use contracts::{ClientAddress, ContractError, FailurePhase};
use ingestion::IngestionError;
use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Error)]
pub enum ImuSyncError {
    #[error("client address {client} is not routable")]
    UnroutableClient { client: ClientAddress },

    #[error("failed to open transfer listener on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("control message failed: {0}")]
    Control(#[source] ContractError),

    #[error("local recording failed: {0}")]
    Recorder(#[source] ContractError),

    #[error("timed out waiting for {client} to upload its recording")]
    TransferTimeout { client: ClientAddress },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error(transparent)]
    Transfer(#[from] TransportError),

    #[error("recording unreadable: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("no delay estimate from recordings ({client} samples vs {leader} samples)")]
    NoEstimate { client: usize, leader: usize },

    #[error("estimation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ImuSyncError {
    /// 失败所处阶段，决定上报的用户提示
    pub fn phase(&self) -> FailurePhase {
        match self {
            Self::UnroutableClient { .. } => FailurePhase::AddressResolution,
            Self::Listen { .. } | Self::Control(_) | Self::Recorder(_) => FailurePhase::Recording,
            Self::TransferTimeout { .. } | Self::Accept(_) | Self::Transfer(_) => {
                FailurePhase::FileTransfer
            }
            Self::Ingestion(_) | Self::NoEstimate { .. } | Self::Join(_) => {
                FailurePhase::OffsetReceipt
            }
        }
    }
}
