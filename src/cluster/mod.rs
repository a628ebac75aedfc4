//! Distributed k-means engine
//!
//! This module holds the numerical core of dkmeans. Each worker owns one
//! [`Shard`] of points and a replica of the [`CentroidSet`]. A run is a fixed
//! number of rounds; every round is:
//!
//! 1. **Local assignment** (`assign`): every point of the shard is assigned to
//!    its nearest centroid and folded into a [`ClusterAccumulator`].
//! 2. **Global aggregation** (`aggregate`): accumulators are sum-reduced onto
//!    the coordinator, which recomputes the centroids and broadcasts them back.
//!
//! The [`controller::IterationController`] drives the rounds.
//!
//! # Memory Layout
//!
//! Points, centroids, and per-cluster sums are stored row-major in one
//! contiguous `Vec<f64>`: value `d` of row `i` lives at `i * dim + d`.
//!
//! ```text
//! Shard (n points, dim=3):  [p0.x p0.y p0.z | p1.x p1.y p1.z | ...]
//! CentroidSet (k=2):        [c0.x c0.y c0.z | c1.x c1.y c1.z]
//! Accumulator sums (k=2):   [s0.x s0.y s0.z | s1.x s1.y s1.z]  counts: [n0, n1]
//! ```

pub mod aggregate;
pub mod assign;
pub mod controller;
pub mod distance;
pub mod shard;

use crate::error::ClusterError;
use serde::{Deserialize, Serialize};

pub use aggregate::{aggregate_round, recompute_centroids, RoundOutcome};
pub use assign::{assign_points, assign_points_parallel, nearest_centroid};
pub use controller::{ClusterOutcome, ControllerState, IterationController, RoundSummary};
pub use distance::distance;
pub use shard::{generate_shard, ShardSpec};

/// Empty `Vec<f64>` with room for `len` values, reporting allocation failure
pub(crate) fn try_with_capacity(len: usize, what: &'static str) -> Result<Vec<f64>, ClusterError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| ClusterError::Allocation {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<f64>()),
        })?;
    Ok(values)
}

/// Zeroed `Vec<f64>` of `len` values
pub(crate) fn try_zeroed(len: usize, what: &'static str) -> Result<Vec<f64>, ClusterError> {
    let mut values = try_with_capacity(len, what)?;
    values.resize(len, 0.0);
    Ok(values)
}

/// A worker's private slice of the point set
///
/// Immutable after construction. Never sent between workers.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    dim: usize,
    values: Vec<f64>,
}

impl Shard {
    /// Wrap row-major values as a shard
    ///
    /// Trailing values that do not fill a whole point are rejected.
    pub fn from_values(dim: usize, values: Vec<f64>) -> Result<Self, ClusterError> {
        if dim == 0 || values.len() % dim != 0 {
            return Err(ClusterError::DimensionMismatch {
                expected: dim,
                actual: values.len() % dim.max(1),
            });
        }
        Ok(Self { dim, values })
    }

    /// Take worker `rank`'s contiguous slice of a full point set
    ///
    /// Each of the `world_size` workers owns `total / world_size` points; the
    /// remainder at the end of the set is dropped. `rank` must be below
    /// `world_size`.
    pub fn from_points_slice(
        all_values: &[f64],
        dim: usize,
        rank: usize,
        world_size: usize,
    ) -> Result<Self, ClusterError> {
        if dim == 0 || all_values.len() % dim != 0 {
            return Err(ClusterError::DimensionMismatch {
                expected: dim,
                actual: all_values.len() % dim.max(1),
            });
        }
        debug_assert!(rank < world_size);
        let total = all_values.len() / dim;
        let per_worker = total / world_size.max(1);
        let start = rank * per_worker * dim;
        let end = start + per_worker * dim;

        let mut values = try_with_capacity(end - start, "shard")?;
        values.extend_from_slice(&all_values[start..end]);

        Ok(Self { dim, values })
    }

    /// Dimensionality of each point
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Point `index` as a `dim`-length slice
    pub fn point(&self, index: usize) -> &[f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Iterate over points in order
    pub fn points(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.dim)
    }

    /// Raw row-major values
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// The current cluster representatives
///
/// Logically one shared value; physically every worker holds a copy that the
/// coordinator overwrites by broadcast once per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CentroidSetWire")]
pub struct CentroidSet {
    k: usize,
    dim: usize,
    values: Vec<f64>,
}

impl CentroidSet {
    /// Wrap `k * dim` row-major values
    pub fn from_values(k: usize, dim: usize, values: Vec<f64>) -> Result<Self, ClusterError> {
        if dim == 0 || k.checked_mul(dim) != Some(values.len()) {
            return Err(ClusterError::DimensionMismatch {
                expected: k.saturating_mul(dim),
                actual: values.len(),
            });
        }
        Ok(Self { k, dim, values })
    }

    /// Seed from the first `k` points of a shard
    ///
    /// Deterministic first-K seeding: no randomization and no k-means++.
    pub fn seed_from_shard(shard: &Shard, k: usize) -> Result<Self, ClusterError> {
        if shard.len() < k {
            return Err(ClusterError::ShardTooSmall {
                points: shard.len(),
                k,
            });
        }
        let len = k * shard.dim();
        let mut values = try_with_capacity(len, "centroid set")?;
        values.extend_from_slice(&shard.values()[..len]);
        Ok(Self {
            k,
            dim: shard.dim(),
            values,
        })
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Centroid `cluster` as a `dim`-length slice
    pub fn centroid(&self, cluster: usize) -> &[f64] {
        &self.values[cluster * self.dim..(cluster + 1) * self.dim]
    }

    pub(crate) fn centroid_mut(&mut self, cluster: usize) -> &mut [f64] {
        &mut self.values[cluster * self.dim..(cluster + 1) * self.dim]
    }

    /// Iterate over centroids in cluster order
    pub fn centroids(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.dim)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Largest Euclidean distance any centroid moved relative to `previous`
    pub fn max_shift(&self, previous: &CentroidSet) -> f64 {
        self.centroids()
            .zip(previous.centroids())
            .map(|(now, before)| distance(now, before))
            .fold(0.0, f64::max)
    }
}

/// Per-cluster running sums and counts
///
/// Used both as a worker's Local Accumulator and, on the coordinator, as the
/// Global Accumulator holding the element-wise sum across workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ClusterAccumulatorWire")]
pub struct ClusterAccumulator {
    k: usize,
    dim: usize,
    sums: Vec<f64>,
    counts: Vec<u64>,
}

impl ClusterAccumulator {
    /// Zeroed accumulator for `k` clusters of `dim` values
    pub fn new(k: usize, dim: usize) -> Result<Self, ClusterError> {
        let sums = try_zeroed(k * dim, "accumulator sums")?;
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(k)
            .map_err(|_| ClusterError::Allocation {
                what: "accumulator counts",
                bytes: k * std::mem::size_of::<u64>(),
            })?;
        counts.resize(k, 0);
        Ok(Self { k, dim, sums, counts })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Zero every sum and count
    pub fn reset(&mut self) {
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    /// Fold one point into `cluster`
    #[inline]
    pub fn add_point(&mut self, cluster: usize, point: &[f64]) {
        debug_assert_eq!(point.len(), self.dim);
        let sum = &mut self.sums[cluster * self.dim..(cluster + 1) * self.dim];
        for (s, &v) in sum.iter_mut().zip(point) {
            *s += v;
        }
        self.counts[cluster] += 1;
    }

    /// Element-wise add another accumulator into this one
    pub fn merge(&mut self, other: &ClusterAccumulator) -> Result<(), ClusterError> {
        if other.k != self.k || other.dim != self.dim {
            return Err(ClusterError::DimensionMismatch {
                expected: self.k * self.dim,
                actual: other.k * other.dim,
            });
        }
        for (s, &o) in self.sums.iter_mut().zip(&other.sums) {
            *s += o;
        }
        for (c, &o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        Ok(())
    }

    /// Sum vector for `cluster`
    pub fn sum(&self, cluster: usize) -> &[f64] {
        &self.sums[cluster * self.dim..(cluster + 1) * self.dim]
    }

    /// Number of points assigned to `cluster`
    pub fn count(&self, cluster: usize) -> u64 {
        self.counts[cluster]
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Points assigned across all clusters
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Clusters that received no point
    pub fn empty_clusters(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }
}

/// Centroid set as received from a peer, before its shape is checked
#[derive(Deserialize)]
struct CentroidSetWire {
    k: usize,
    dim: usize,
    values: Vec<f64>,
}

impl TryFrom<CentroidSetWire> for CentroidSet {
    type Error = ClusterError;

    fn try_from(wire: CentroidSetWire) -> Result<Self, ClusterError> {
        CentroidSet::from_values(wire.k, wire.dim, wire.values)
    }
}

/// Accumulator as received from a peer, before its shape is checked
#[derive(Deserialize)]
struct ClusterAccumulatorWire {
    k: usize,
    dim: usize,
    sums: Vec<f64>,
    counts: Vec<u64>,
}

impl TryFrom<ClusterAccumulatorWire> for ClusterAccumulator {
    type Error = ClusterError;

    fn try_from(wire: ClusterAccumulatorWire) -> Result<Self, ClusterError> {
        let expected_sums = wire.k.checked_mul(wire.dim);
        if expected_sums != Some(wire.sums.len()) {
            return Err(ClusterError::DimensionMismatch {
                expected: wire.k.saturating_mul(wire.dim),
                actual: wire.sums.len(),
            });
        }
        if wire.counts.len() != wire.k {
            return Err(ClusterError::DimensionMismatch {
                expected: wire.k,
                actual: wire.counts.len(),
            });
        }
        Ok(Self {
            k: wire.k,
            dim: wire.dim,
            sums: wire.sums,
            counts: wire.counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_from_values_rejects_partial_point() {
        assert!(Shard::from_values(3, vec![0.0; 7]).is_err());
        assert!(Shard::from_values(0, vec![]).is_err());

        let shard = Shard::from_values(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(shard.len(), 2);
        assert_eq!(shard.point(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_shard_slice_truncates_remainder() {
        // 7 one-dimensional points across 3 workers: 2 each, point 6 dropped
        let all: Vec<f64> = (0..7).map(|v| v as f64).collect();

        let s0 = Shard::from_points_slice(&all, 1, 0, 3).unwrap();
        let s1 = Shard::from_points_slice(&all, 1, 1, 3).unwrap();
        let s2 = Shard::from_points_slice(&all, 1, 2, 3).unwrap();

        assert_eq!(s0.values(), &[0.0, 1.0]);
        assert_eq!(s1.values(), &[2.0, 3.0]);
        assert_eq!(s2.values(), &[4.0, 5.0]);
    }

    #[test]
    fn test_seed_from_shard_takes_first_k() {
        let shard = Shard::from_values(2, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        let centroids = CentroidSet::seed_from_shard(&shard, 2).unwrap();

        assert_eq!(centroids.k(), 2);
        assert_eq!(centroids.centroid(0), &[0.1, 0.2]);
        assert_eq!(centroids.centroid(1), &[0.3, 0.4]);
    }

    #[test]
    fn test_seed_from_small_shard_fails() {
        let shard = Shard::from_values(1, vec![0.5]).unwrap();
        match CentroidSet::seed_from_shard(&shard, 2) {
            Err(ClusterError::ShardTooSmall { points, k }) => {
                assert_eq!(points, 1);
                assert_eq!(k, 2);
            }
            other => panic!("Expected ShardTooSmall, got {:?}", other),
        }
    }

    #[test]
    fn test_accumulator_add_merge_reset() {
        let mut a = ClusterAccumulator::new(2, 2).unwrap();
        a.add_point(0, &[1.0, 2.0]);
        a.add_point(0, &[3.0, 4.0]);

        let mut b = ClusterAccumulator::new(2, 2).unwrap();
        b.add_point(1, &[5.0, 6.0]);

        a.merge(&b).unwrap();
        assert_eq!(a.sum(0), &[4.0, 6.0]);
        assert_eq!(a.sum(1), &[5.0, 6.0]);
        assert_eq!(a.counts(), &[2, 1]);
        assert_eq!(a.total_count(), 3);
        assert_eq!(a.empty_clusters(), 0);

        a.reset();
        assert_eq!(a.total_count(), 0);
        assert_eq!(a.sum(0), &[0.0, 0.0]);
        assert_eq!(a.empty_clusters(), 2);
    }

    #[test]
    fn test_accumulator_merge_shape_mismatch() {
        let mut a = ClusterAccumulator::new(2, 2).unwrap();
        let b = ClusterAccumulator::new(3, 2).unwrap();
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_centroid_set_rejects_short_values_on_receipt() {
        let short = serde_json::json!({ "k": 2, "dim": 1, "values": [0.5] });
        assert!(serde_json::from_value::<CentroidSet>(short).is_err());

        let overflow = serde_json::json!({ "k": usize::MAX, "dim": 2, "values": [] });
        assert!(serde_json::from_value::<CentroidSet>(overflow).is_err());

        let good = CentroidSet::from_values(2, 1, vec![0.5, 1.5]).unwrap();
        let value = serde_json::to_value(&good).unwrap();
        assert_eq!(serde_json::from_value::<CentroidSet>(value).unwrap(), good);
    }

    #[test]
    fn test_accumulator_rejects_bad_shape_on_receipt() {
        let short_sums = serde_json::json!({ "k": 2, "dim": 2, "sums": [1.0, 2.0, 3.0], "counts": [1, 1] });
        assert!(serde_json::from_value::<ClusterAccumulator>(short_sums).is_err());

        let short_counts = serde_json::json!({ "k": 2, "dim": 1, "sums": [1.0, 2.0], "counts": [1] });
        assert!(serde_json::from_value::<ClusterAccumulator>(short_counts).is_err());

        let mut good = ClusterAccumulator::new(2, 1).unwrap();
        good.add_point(1, &[0.25]);
        let value = serde_json::to_value(&good).unwrap();
        assert_eq!(serde_json::from_value::<ClusterAccumulator>(value).unwrap(), good);
    }

    #[test]
    fn test_max_shift() {
        let before = CentroidSet::from_values(2, 1, vec![0.0, 1.0]).unwrap();
        let after = CentroidSet::from_values(2, 1, vec![0.25, 1.5]).unwrap();
        assert_eq!(after.max_shift(&before), 0.5);
        assert_eq!(before.max_shift(&before), 0.0);
    }
}
