//! TimeSyncEngine trait - scheduler dispatch interface

use crate::{ClientAddress, SyncResult};

/// Strategy that measures the clock offset of one client.
///
/// The scheduler depends only on this trait, never on a concrete strategy.
#[trait_variant::make(TimeSyncEngine: Send)]
pub trait LocalTimeSyncEngine {
    /// Strategy name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Measure `client - leader` for one client.
    ///
    /// Never fails: every error is logged and folded into
    /// [`SyncResult::failure`].
    async fn synchronize(&self, client: ClientAddress) -> SyncResult;
}
