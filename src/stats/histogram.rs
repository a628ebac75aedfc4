//! Round time histogram using HdrHistogram
//!
//! Records the wall time of each round (assignment pass plus both collectives)
//! on the coordinator.
//!
//! # Example
//!
//! ```
//! use dkmeans::stats::histogram::RoundTimeHistogram;
//! use std::time::Duration;
//!
//! let mut hist = RoundTimeHistogram::new().unwrap();
//! hist.record(Duration::from_millis(12));
//! hist.record(Duration::from_millis(15));
//!
//! assert_eq!(hist.len(), 2);
//! assert!(hist.percentile(50.0).is_some());
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use std::time::Duration;

/// Longest round the histogram tracks exactly (1 hour in nanoseconds)
const MAX_TRACKED_NANOS: u64 = 3_600_000_000_000;

/// Round time histogram wrapper
///
/// Tracks 1ns to 1 hour with 3 significant digits (0.1% precision). Longer
/// rounds are clamped to the upper bound.
#[derive(Debug)]
pub struct RoundTimeHistogram {
    histogram: Histogram<u64>,
}

impl RoundTimeHistogram {
    /// Create an empty histogram
    pub fn new() -> Result<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_NANOS, 3)
            .map_err(|e| anyhow::anyhow!("Failed to create round time histogram: {}", e))?;

        Ok(Self { histogram })
    }

    /// Record one round's duration
    #[inline]
    pub fn record(&mut self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let value = nanos.clamp(1, MAX_TRACKED_NANOS);
        // In range after clamping
        let _ = self.histogram.record(value);
    }

    /// Round time at `percentile` (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    /// Number of rounds recorded
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }
}
