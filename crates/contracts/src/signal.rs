//! Timestamped three-axis signal traces

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Time-ascending `(timestamp_seconds, [x, y, z])` samples.
///
/// A series is either fully populated from a source or empty; it is never
/// partially filled from a malformed recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSeries {
    timestamps: Vec<f64>,
    samples: Vec<[f64; 3]>,
}

impl SignalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Build a series from parallel columns.
    ///
    /// # Errors
    /// Column lengths differ, or timestamps decrease.
    pub fn from_parts(timestamps: Vec<f64>, samples: Vec<[f64; 3]>) -> Result<Self, ContractError> {
        if timestamps.len() != samples.len() {
            return Err(ContractError::SeriesMismatch {
                timestamps: timestamps.len(),
                samples: samples.len(),
            });
        }
        if let Some(index) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(ContractError::SeriesOrder { index: index + 1 });
        }
        Ok(Self {
            timestamps,
            samples,
        })
    }

    /// Append a sample; returns `false` (and drops it) if it would break ordering
    pub fn push(&mut self, timestamp: f64, sample: [f64; 3]) -> bool {
        if self.timestamps.last().is_some_and(|&last| timestamp < last) {
            return false;
        }
        self.timestamps.push(timestamp);
        self.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn samples(&self) -> &[[f64; 3]] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, [f64; 3])> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.samples.iter().copied())
    }

    /// Keep only the first `len` samples
    pub fn truncate(&mut self, len: usize) {
        self.timestamps.truncate(len);
        self.samples.truncate(len);
    }

    /// Last minus first timestamp (0 for fewer than two samples)
    pub fn span(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Mean spacing between consecutive timestamps
    pub fn mean_interval(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let sum: f64 = self.timestamps.windows(2).map(|w| w[1] - w[0]).sum();
        Some(sum / (self.len() - 1) as f64)
    }
}

/// Estimated delay between two recordings of the same motion.
///
/// Positive `delay_seconds` means the second trace lags the first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayEstimate {
    pub delay_seconds: f64,
    /// Uniform grid step the correlation ran on (s)
    pub step_seconds: f64,
    /// Integer part of the lag in grid steps
    pub lag_steps: i64,
}
