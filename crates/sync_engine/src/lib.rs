//! # Sync Engine
//!
//! Leader 侧时钟同步核心。
//!
//! 负责：
//! - `SyncScheduler`: per-client 去重队列，结果写回 registry 并通知 client
//! - `ClockExchangeEngine`: 基于 UDP 往返的 offset 测量
//! - `ImuSyncEngine` + `SignalDelayEstimator`: 基于陀螺仪互相关的 offset 测量
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{ClockExchangeEngine, InMemoryClientRegistry, SyncScheduler};
//!
//! let engine = ClockExchangeEngine::new(socket, clock, config.exchange.clone(), 9428);
//! let registry = Arc::new(InMemoryClientRegistry::with_clients(config.clients.clone()));
//! let scheduler = SyncScheduler::spawn(engine, registry, rpc, config.scheduler.shutdown_grace());
//!
//! // heartbeat
//! scheduler.submit(client);
//! ```

mod error;
mod estimator;
mod exchange;
mod imu_sync;
mod registry;
mod scheduler;
mod spline;

pub use error::ImuSyncError;
pub use estimator::{EstimatorConfig, SignalDelayEstimator};
pub use exchange::ClockExchangeEngine;
pub use imu_sync::{compare_recordings, ImuSyncEngine, RecordingComparison, CLIENT_RECORDING_NAME};
pub use registry::InMemoryClientRegistry;
pub use scheduler::{PendingSet, ShutdownOutcome, SubmitOutcome, SyncScheduler};

// Re-export contracts types
pub use contracts::{DelayEstimate, SignalSeries, SyncEvent, SyncResult, TimeSyncEngine};
