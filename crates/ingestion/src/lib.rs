//! # Ingestion
//!
//! Gyroscope recording ingestion module.
//!
//! Responsibilities:
//! - Parse `x,y,z,t_ns` recordings into `SignalSeries` (all-or-nothing)
//! - Write recordings in the same format
//! - Provide `GyroRecorder` backends (live mock, file replay)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::read_signal_csv;
//!
//! let series = read_signal_csv(Path::new("local_sensors/gyro_client.csv"))?;
//! if series.is_empty() {
//!     // malformed or empty recording
//! }
//! ```

mod csv;
mod error;
mod mock;
mod replay;

// Re-exports
pub use csv::{parse_signal_csv, read_signal_csv, write_signal_csv, GyroCsvWriter};
pub use error::{IngestionError, Result};
pub use mock::{MockGyroConfig, MockGyroRecorder, MotionProfile};
pub use replay::ReplayGyroRecorder;
