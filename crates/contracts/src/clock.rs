//! Local time sources

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic local-time source in nanoseconds.
///
/// Readings are only comparable within one clock instance.
pub trait Clock: Send + Sync {
    fn read(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn read(&self) -> i64 {
        (**self).read()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn read(&self) -> i64 {
        (**self).read()
    }
}

/// Nanoseconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn read(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Client clock shifted onto the leader's timeline.
///
/// `read()` = local reading - last offset received from the leader.
#[derive(Debug)]
pub struct LeaderAlignedClock<C> {
    local: C,
    offset_ns: AtomicI64,
}

impl<C: Clock> LeaderAlignedClock<C> {
    pub fn new(local: C) -> Self {
        Self {
            local,
            offset_ns: AtomicI64::new(0),
        }
    }

    /// Apply an aligned offset (`client - leader`, ns)
    pub fn set_offset_ns(&self, offset_ns: i64) {
        self.offset_ns.store(offset_ns, Ordering::Release);
    }

    pub fn offset_ns(&self) -> i64 {
        self.offset_ns.load(Ordering::Acquire)
    }

    /// Unshifted device time
    pub fn local(&self) -> &C {
        &self.local
    }
}

impl<C: Clock> Clock for LeaderAlignedClock<C> {
    fn read(&self) -> i64 {
        self.local.read().wrapping_sub(self.offset_ns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn read(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let a = clock.read();
        let b = clock.read();
        assert!(a >= 0);
        assert!(b >= a);
    }

    #[test]
    fn test_leader_aligned_clock_applies_offset() {
        let clock = LeaderAlignedClock::new(FixedClock(1_000));
        assert_eq!(clock.read(), 1_000);

        clock.set_offset_ns(-250);
        assert_eq!(clock.read(), 1_250);
        assert_eq!(clock.local().read(), 1_000);
    }

    #[test]
    fn test_arc_clock_delegates() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(42));
        assert_eq!(clock.read(), 42);
    }
}
