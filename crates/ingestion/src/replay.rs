//! Replay 录制器 - 将已有录制文件作为本次录制结果
//!
//! 用于离线复现与端到端测试：start 只登记会话，stop 把源文件复制为会话文件。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, GyroRecorder};
use metrics::counter;
use tracing::info;

use crate::error::{IngestionError, Result};

/// Replay 录制器
pub struct ReplayGyroRecorder {
    source: PathBuf,
    output_dir: PathBuf,
    file_prefix: String,
    session: Mutex<Option<String>>,
}

impl ReplayGyroRecorder {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            file_prefix: "gyro".to_string(),
            session: Mutex::new(None),
        }
    }

    /// 设置输出文件名前缀
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn session(&self) -> MutexGuard<'_, Option<String>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, session: &str) -> Result<()> {
        if !self.source.is_file() {
            return Err(IngestionError::ReplaySourceMissing {
                path: self.source.clone(),
            });
        }
        let mut current = self.session();
        if let Some(active) = current.as_ref() {
            return Err(IngestionError::AlreadyRecording {
                session: active.clone(),
            });
        }
        *current = Some(session.to_string());
        Ok(())
    }

    fn end(&self) -> Result<PathBuf> {
        let session = self.session().take().ok_or(IngestionError::NotRecording)?;
        fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("{}_{}.csv", self.file_prefix, session));
        fs::copy(&self.source, &path)?;

        counter!("gyro_recordings_total", "recorder" => "replay").increment(1);
        info!(session = %session, path = %path.display(), "replayed gyro recording saved");
        Ok(path)
    }
}

impl GyroRecorder for ReplayGyroRecorder {
    fn start_recording(&self, session: &str) -> std::result::Result<(), ContractError> {
        Ok(self.begin(session)?)
    }

    fn stop_recording(&self) -> std::result::Result<PathBuf, ContractError> {
        Ok(self.end()?)
    }

    fn is_recording(&self) -> bool {
        self.session().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_copies_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.csv");
        fs::write(&source, "1,2,3,100\n").unwrap();

        let recorder = ReplayGyroRecorder::new(&source, dir.path().join("out"));
        recorder.start_recording("s").unwrap();
        assert!(recorder.is_recording());

        let path = recorder.stop_recording().unwrap();
        assert!(!recorder.is_recording());
        assert_eq!(fs::read_to_string(path).unwrap(), "1,2,3,100\n");
    }

    #[test]
    fn test_missing_source_fails_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = ReplayGyroRecorder::new(dir.path().join("nope.csv"), dir.path());
        let err = recorder.start_recording("s").unwrap_err();
        assert!(err.to_string().contains("replay source not found"));
        assert!(!recorder.is_recording());
    }
}
