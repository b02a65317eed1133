//! Listener metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one client-side socket loop
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Messages handled successfully
    handled: AtomicU64,
    /// Messages with a bad size or encoding
    malformed: AtomicU64,
    /// Control messages with an unknown method code
    unknown: AtomicU64,
    /// Handling failures (send errors, recording/upload errors)
    failures: AtomicU64,
}

impl ListenerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown(&self) {
        self.unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handled: self.handled.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of listener metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub handled: u64,
    pub malformed: u64,
    pub unknown: u64,
    pub failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = ListenerMetrics::new();
        metrics.inc_handled();
        metrics.inc_handled();
        metrics.inc_unknown();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handled, 2);
        assert_eq!(snapshot.unknown, 1);
        assert_eq!(snapshot.malformed, 0);
        assert_eq!(snapshot.failures, 0);
    }
}
