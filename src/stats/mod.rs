//! Run statistics
//!
//! Summarizes the coordinator's per-round history: round time percentiles,
//! centroid movement, and empty clusters.
//!
//! # Example
//!
//! ```
//! use dkmeans::cluster::RoundSummary;
//! use dkmeans::stats::RunStats;
//! use std::time::Duration;
//!
//! let history = vec![
//!     RoundSummary { round: 0, assigned: 8, empty_clusters: 1, max_shift: 0.39, duration: Duration::from_millis(3) },
//!     RoundSummary { round: 1, assigned: 8, empty_clusters: 0, max_shift: 0.38, duration: Duration::from_millis(2) },
//! ];
//!
//! let stats = RunStats::from_history(&history).unwrap();
//! assert_eq!(stats.rounds(), 2);
//! assert_eq!(stats.rounds_with_empty_clusters(), 1);
//! ```

pub mod histogram;

use crate::cluster::RoundSummary;
use crate::Result;
use histogram::RoundTimeHistogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate view of one run's rounds
#[derive(Debug)]
pub struct RunStats {
    round_times: RoundTimeHistogram,
    rounds_with_empty: usize,
    max_empty_clusters: usize,
    final_shift: Option<f64>,
    last_moving_round: Option<usize>,
}

impl RunStats {
    /// Build from the coordinator's history
    pub fn from_history(history: &[RoundSummary]) -> Result<Self> {
        let mut round_times = RoundTimeHistogram::new()?;
        let mut rounds_with_empty = 0;
        let mut max_empty_clusters = 0;
        let mut last_moving_round = None;

        for summary in history {
            round_times.record(summary.duration);
            if summary.empty_clusters > 0 {
                rounds_with_empty += 1;
            }
            max_empty_clusters = max_empty_clusters.max(summary.empty_clusters);
            if summary.max_shift > 0.0 {
                last_moving_round = Some(summary.round);
            }
        }

        Ok(Self {
            round_times,
            rounds_with_empty,
            max_empty_clusters,
            final_shift: history.last().map(|s| s.max_shift),
            last_moving_round,
        })
    }

    /// Rounds recorded
    pub fn rounds(&self) -> u64 {
        self.round_times.len()
    }

    pub fn round_times(&self) -> &RoundTimeHistogram {
        &self.round_times
    }

    /// Rounds in which at least one cluster received no point
    pub fn rounds_with_empty_clusters(&self) -> usize {
        self.rounds_with_empty
    }

    pub fn max_empty_clusters(&self) -> usize {
        self.max_empty_clusters
    }

    /// Largest centroid movement in the last round
    pub fn final_shift(&self) -> Option<f64> {
        self.final_shift
    }

    /// Last round in which any centroid moved
    ///
    /// Rounds after it were spent at a fixed point; the run does not stop early.
    pub fn last_moving_round(&self) -> Option<usize> {
        self.last_moving_round
    }

    /// Round time percentiles, or None if no round ran
    pub fn timing_summary(&self) -> Option<TimingSummary> {
        let hist = &self.round_times;
        Some(TimingSummary {
            min_ms: millis(hist.min()?),
            mean_ms: millis(hist.mean()?),
            p50_ms: millis(hist.percentile(50.0)?),
            p99_ms: millis(hist.percentile(99.0)?),
            max_ms: millis(hist.max()?),
        })
    }
}

/// Round time percentiles in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub min_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(round: usize, empty_clusters: usize, max_shift: f64, ms: u64) -> RoundSummary {
        RoundSummary {
            round,
            assigned: 100,
            empty_clusters,
            max_shift,
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_empty_history() {
        let stats = RunStats::from_history(&[]).unwrap();
        assert_eq!(stats.rounds(), 0);
        assert!(stats.timing_summary().is_none());
        assert!(stats.final_shift().is_none());
        assert!(stats.last_moving_round().is_none());
    }

    #[test]
    fn test_history_summary() {
        let history = vec![
            summary(0, 2, 0.5, 10),
            summary(1, 1, 0.1, 20),
            summary(2, 0, 0.0, 30),
            summary(3, 0, 0.0, 40),
        ];
        let stats = RunStats::from_history(&history).unwrap();

        assert_eq!(stats.rounds(), 4);
        assert_eq!(stats.rounds_with_empty_clusters(), 2);
        assert_eq!(stats.max_empty_clusters(), 2);
        assert_eq!(stats.final_shift(), Some(0.0));
        assert_eq!(stats.last_moving_round(), Some(1));

        let timing = stats.timing_summary().unwrap();
        assert!((timing.min_ms - 10.0).abs() < 0.05);
        assert!((timing.max_ms - 40.0).abs() < 0.05);
        assert!((timing.mean_ms - 25.0).abs() < 0.05);
        assert!(timing.p50_ms <= timing.p99_ms);
    }
}
