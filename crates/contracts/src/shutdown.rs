//! Shutdown flag shared between a long-running socket loop and its owner

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once when the process starts stopping.
///
/// Socket loops check it before treating a receive error as fatal.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
