//! Synchronization results and events

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ClientAddress;

/// Outcome of one synchronization attempt.
///
/// `success == false` means offset and accuracy carry no information and
/// must never be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Estimated `client - leader` offset (ns)
    pub offset_ns: i64,
    /// Round-trip latency or grid step backing the estimate (ns)
    pub sync_accuracy_ns: i64,
    pub success: bool,
}

impl SyncResult {
    pub const fn success(offset_ns: i64, sync_accuracy_ns: i64) -> Self {
        Self {
            offset_ns,
            sync_accuracy_ns,
            success: true,
        }
    }

    /// `{0, 0, false}`
    pub const fn failure() -> Self {
        Self {
            offset_ns: 0,
            sync_accuracy_ns: 0,
            success: false,
        }
    }
}

/// One round of the four-timestamp exchange.
///
/// `t0`/`t3` are leader readings (send/receive), `t1`/`t2` client readings
/// (receive/reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSample {
    pub t0: i64,
    pub t1: i64,
    pub t2: i64,
    pub t3: i64,
}

impl ExchangeSample {
    /// `((t1 - t0) + (t2 - t3)) / 2`
    pub fn offset_ns(&self) -> i64 {
        self.t1
            .wrapping_sub(self.t0)
            .wrapping_add(self.t2.wrapping_sub(self.t3))
            / 2
    }

    /// `(t3 - t0) - (t2 - t1)`
    pub fn latency_ns(&self) -> i64 {
        self.t3
            .wrapping_sub(self.t0)
            .wrapping_sub(self.t2.wrapping_sub(self.t1))
    }
}

/// Phase of the signal-based path that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Recording,
    AddressResolution,
    FileTransfer,
    OffsetReceipt,
}

impl FailurePhase {
    /// Short human-readable message shown to the operator
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Recording => "Sync failed: couldn't collect sensor files",
            Self::AddressResolution => "Sync failed: couldn't resolve client address",
            Self::FileTransfer => "Sync failed: couldn't transfer sensor file",
            Self::OffsetReceipt => "Sync failed: couldn't obtain offset",
        }
    }
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Notification for observers of the scheduler and engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Registry updated and offset pushed to the client
    OffsetUpdated {
        client: ClientAddress,
        aligned_offset_ns: i64,
        sync_accuracy_ns: i64,
    },
    /// Signal-based sync failed at a given phase
    Failed {
        client: ClientAddress,
        phase: FailurePhase,
    },
}

impl SyncEvent {
    pub fn client(&self) -> ClientAddress {
        match self {
            Self::OffsetUpdated { client, .. } | Self::Failed { client, .. } => *client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_exchange() {
        // client 500ns ahead, 100ns each way, 20ns processing
        let sample = ExchangeSample {
            t0: 1_000,
            t1: 1_600,
            t2: 1_620,
            t3: 1_220,
        };
        assert_eq!(sample.offset_ns(), 500);
        assert_eq!(sample.latency_ns(), 200);
    }

    #[test]
    fn test_offset_truncates_toward_zero() {
        let sample = ExchangeSample {
            t0: 0,
            t1: 0,
            t2: 0,
            t3: 3,
        };
        assert_eq!(sample.offset_ns(), -1);
    }

    #[test]
    fn test_failure_is_all_zero() {
        let failure = SyncResult::failure();
        assert_eq!(failure.offset_ns, 0);
        assert_eq!(failure.sync_accuracy_ns, 0);
        assert!(!failure.success);
        assert!(SyncResult::success(5, 1).success);
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let phases = [
            FailurePhase::Recording,
            FailurePhase::AddressResolution,
            FailurePhase::FileTransfer,
            FailurePhase::OffsetReceipt,
        ];
        let messages: std::collections::HashSet<_> =
            phases.iter().map(FailurePhase::message).collect();
        assert_eq!(messages.len(), phases.len());
    }
}
