//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the capture-sync workspace.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Device clocks are read as monotonic `i64` nanoseconds (`Clock::read`)
//! - Gyroscope recordings carry `f64` seconds converted from those nanoseconds
//! - Offsets are always `client - leader`; leader time = client time - offset

mod address;
mod clock;
mod engine;
mod error;
mod recorder;
mod registry;
mod rpc;
mod shutdown;
mod signal;
mod sync;
mod sync_config;
mod transport;

pub use address::ClientAddress;
pub use clock::*;
pub use engine::*;
pub use error::*;
pub use recorder::GyroRecorder;
pub use registry::*;
pub use rpc::*;
pub use shutdown::ShutdownFlag;
pub use signal::*;
pub use sync::*;
pub use sync_config::*;
pub use transport::*;
