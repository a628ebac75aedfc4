//! Global aggregation
//!
//! Turns every worker's local sums and counts into the next centroid set:
//! reduce onto the coordinator, recompute there, broadcast back.

use super::{CentroidSet, ClusterAccumulator};
use crate::comm::{Phase, WorkerGroup};
use crate::error::ClusterError;
use crate::Result;

/// What one aggregation step produced
///
/// The global figures are only known on the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Points assigned across all workers
    pub assigned: Option<u64>,
    /// Clusters that received no point and kept their previous centroid
    pub empty_clusters: Option<usize>,
    /// Largest centroid movement this round
    pub max_shift: Option<f64>,
}

/// Recompute centroids from the global sums and counts
///
/// Each cluster with a non-zero count moves to `sum / count`. A cluster with
/// zero count keeps its previous value. Returns the number of such clusters.
pub fn recompute_centroids(global: &ClusterAccumulator, centroids: &mut CentroidSet) -> Result<usize> {
    if global.k() != centroids.k() || global.dim() != centroids.dim() {
        return Err(ClusterError::DimensionMismatch {
            expected: centroids.k() * centroids.dim(),
            actual: global.k() * global.dim(),
        }
        .into());
    }

    let mut empty = 0;
    for cluster in 0..centroids.k() {
        let count = global.count(cluster);
        if count == 0 {
            empty += 1;
            continue;
        }
        let n = count as f64;
        for (c, &s) in centroids.centroid_mut(cluster).iter_mut().zip(global.sum(cluster)) {
            *c = s / n;
        }
    }
    Ok(empty)
}

/// Run one aggregation step
///
/// Every member of `group` must call this with the same `round`. On return
/// `centroids` holds the coordinator's new centroid set on every worker.
pub fn aggregate_round<G: WorkerGroup + ?Sized>(
    group: &mut G,
    round: usize,
    local: &ClusterAccumulator,
    centroids: &mut CentroidSet,
) -> Result<RoundOutcome> {
    let phase = Phase::Round(round);
    let global = group.reduce_sum(phase, local)?;

    let mut outcome = RoundOutcome {
        assigned: None,
        empty_clusters: None,
        max_shift: None,
    };

    let updated = match global {
        Some(global) => {
            let previous = centroids.clone();
            let empty = recompute_centroids(&global, centroids)?;
            outcome.assigned = Some(global.total_count());
            outcome.empty_clusters = Some(empty);
            outcome.max_shift = Some(centroids.max_shift(&previous));
            group.broadcast(phase, Some(centroids))?
        }
        None => group.broadcast(phase, None)?,
    };

    if updated.k() != centroids.k() || updated.dim() != centroids.dim() {
        return Err(ClusterError::DimensionMismatch {
            expected: centroids.k() * centroids.dim(),
            actual: updated.k() * updated.dim(),
        }
        .into());
    }
    *centroids = updated;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{assign_points, Shard};
    use crate::comm::LocalGroup;

    #[test]
    fn test_recompute_means() {
        let mut global = ClusterAccumulator::new(2, 2).unwrap();
        global.add_point(0, &[1.0, 2.0]);
        global.add_point(0, &[3.0, 4.0]);
        global.add_point(1, &[0.5, 0.5]);

        let mut centroids = CentroidSet::from_values(2, 2, vec![0.0; 4]).unwrap();
        let empty = recompute_centroids(&global, &mut centroids).unwrap();

        assert_eq!(empty, 0);
        assert_eq!(centroids.centroid(0), &[2.0, 3.0]);
        assert_eq!(centroids.centroid(1), &[0.5, 0.5]);
    }

    #[test]
    fn test_recompute_keeps_empty_cluster() {
        let mut global = ClusterAccumulator::new(3, 1).unwrap();
        global.add_point(0, &[0.2]);
        global.add_point(2, &[0.8]);

        let mut centroids = CentroidSet::from_values(3, 1, vec![0.1, 0.42, 0.9]).unwrap();
        let empty = recompute_centroids(&global, &mut centroids).unwrap();

        assert_eq!(empty, 1);
        assert_eq!(centroids.values(), &[0.2, 0.42, 0.8]);
    }

    #[test]
    fn test_recompute_shape_mismatch() {
        let global = ClusterAccumulator::new(2, 1).unwrap();
        let mut centroids = CentroidSet::from_values(3, 1, vec![0.0; 3]).unwrap();
        assert!(recompute_centroids(&global, &mut centroids).is_err());
    }

    #[test]
    fn test_stable_assignment_is_fixed_point() {
        // Centroids already at the cluster means
        let shard = Shard::from_values(1, vec![0.1, 0.3, 0.7, 0.9]).unwrap();
        let mut centroids = CentroidSet::from_values(2, 1, vec![0.2, 0.8]).unwrap();
        let mut acc = ClusterAccumulator::new(2, 1).unwrap();
        assign_points(&shard, &centroids, &mut acc).unwrap();

        let mut group = LocalGroup::create(1, None).unwrap();
        let before = centroids.clone();
        let outcome = aggregate_round(&mut group[0], 0, &acc, &mut centroids).unwrap();

        assert_eq!(outcome.assigned, Some(4));
        assert_eq!(outcome.empty_clusters, Some(0));
        assert!(centroids.max_shift(&before) < 1e-12);
        assert!(outcome.max_shift.unwrap() < 1e-12);
    }

    #[test]
    fn test_aggregate_round_across_threads() {
        let group = LocalGroup::create(3, None).unwrap();
        let shards = [vec![0.1, 0.9], vec![0.2, 0.8], vec![0.15, 0.85]];

        let handles: Vec<_> = group
            .into_iter()
            .zip(shards)
            .map(|(mut member, values)| {
                std::thread::spawn(move || {
                    let shard = Shard::from_values(1, values).unwrap();
                    let mut centroids = CentroidSet::from_values(2, 1, vec![0.0, 1.0]).unwrap();
                    let mut acc = ClusterAccumulator::new(2, 1).unwrap();
                    assign_points(&shard, &centroids, &mut acc).unwrap();
                    let outcome = aggregate_round(&mut member, 0, &acc, &mut centroids).unwrap();
                    (member.rank(), outcome, centroids)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let reference = results[0].2.clone();

        for (rank, outcome, centroids) in &results {
            assert_eq!(centroids, &reference);
            if *rank == 0 {
                assert_eq!(outcome.assigned, Some(6));
            } else {
                assert_eq!(outcome.assigned, None);
                assert_eq!(outcome.max_shift, None);
            }
        }
        assert!((reference.centroid(0)[0] - 0.15).abs() < 1e-12);
        assert!((reference.centroid(1)[0] - 0.85).abs() < 1e-12);
    }
}
