//! Gyroscope recorder interface

use std::path::PathBuf;

use crate::ContractError;

/// Records the local gyroscope to a `x,y,z,t_ns` CSV file.
///
/// At most one recording runs at a time.
pub trait GyroRecorder: Send + Sync {
    /// Begin a recording session; `session` tags the output file name
    fn start_recording(&self, session: &str) -> Result<(), ContractError>;

    /// Finish the running session and return the recording path
    fn stop_recording(&self) -> Result<PathBuf, ContractError>;

    fn is_recording(&self) -> bool;
}
