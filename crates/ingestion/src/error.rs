//! Ingestion 错误类型

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 录制文件无法打开
    #[error("failed to open recording {path}: {source}")]
    Open {
        /// 文件路径
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 读写失败
    #[error("recording io error: {0}")]
    Io(#[from] std::io::Error),

    /// 已在录制
    #[error("recorder is already recording session {session}")]
    AlreadyRecording {
        /// 当前会话
        session: String,
    },

    /// 未在录制
    #[error("recorder is not recording")]
    NotRecording,

    /// 录制线程 panic
    #[error("recording thread for session {session} panicked")]
    RecorderPanicked {
        /// 会话
        session: String,
    },

    /// 回放源文件不存在
    #[error("replay source not found: {path}")]
    ReplaySourceMissing {
        /// 文件路径
        path: PathBuf,
    },
}

impl From<IngestionError> for ContractError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Io(io) => ContractError::Io(io),
            other => ContractError::recording(other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
