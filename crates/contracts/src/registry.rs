//! Client registry interface

use serde::{Deserialize, Serialize};

use crate::{ClientAddress, SyncResult};

/// Last known synchronization state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub address: ClientAddress,
    pub last_offset_ns: i64,
    pub last_accuracy_ns: i64,
    /// Number of successful synchronizations applied
    pub sync_count: u64,
}

impl ClientRecord {
    pub fn new(address: ClientAddress) -> Self {
        Self {
            address,
            last_offset_ns: 0,
            last_accuracy_ns: 0,
            sync_count: 0,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.sync_count > 0
    }
}

/// Authoritative membership and offset store.
///
/// Implementations provide their own thread safety.
pub trait ClientRegistry: Send + Sync {
    fn contains(&self, client: &ClientAddress) -> bool;

    /// Apply a successful result; callers never pass failed results
    fn update_client_offset(&self, client: &ClientAddress, result: &SyncResult);

    /// Leader's own offset from the shared reference epoch (ns)
    fn leader_epoch_offset_ns(&self) -> i64;
}
