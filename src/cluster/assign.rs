//! Local assignment pass
//!
//! Assigns every point of a shard to its nearest centroid and folds it into a
//! [`ClusterAccumulator`]. Points have no dependency on each other, so the
//! pass can be spread across a rayon pool inside one worker.
//!
//! # Determinism
//!
//! Floating-point addition is not associative, so the order in which points
//! are summed matters for bit-identical results. The shard is always cut into
//! fixed-size chunks of [`ASSIGN_CHUNK_POINTS`] points. Each chunk fills its
//! own accumulator and the partial accumulators are merged in chunk order.
//! The sequential and parallel paths share this structure, which makes them
//! produce identical sums regardless of thread count.

use super::{distance, CentroidSet, ClusterAccumulator, Shard};
use crate::error::ClusterError;
use rayon::prelude::*;

/// Points per chunk of the assignment pass
pub const ASSIGN_CHUNK_POINTS: usize = 4096;

/// Index of the centroid nearest to `point`
///
/// Clusters are scanned in index order and only a strictly smaller distance
/// replaces the incumbent, so ties go to the lowest index.
#[inline]
pub fn nearest_centroid(point: &[f64], centroids: &CentroidSet) -> usize {
    let mut closest = 0;
    let mut min_dist = f64::INFINITY;
    for (cluster, centroid) in centroids.centroids().enumerate() {
        let dist = distance(point, centroid);
        if dist < min_dist {
            closest = cluster;
            min_dist = dist;
        }
    }
    closest
}

fn check_shapes(shard: &Shard, centroids: &CentroidSet, acc: &ClusterAccumulator) -> Result<(), ClusterError> {
    if centroids.dim() != shard.dim() {
        return Err(ClusterError::DimensionMismatch {
            expected: shard.dim(),
            actual: centroids.dim(),
        });
    }
    if acc.k() != centroids.k() || acc.dim() != centroids.dim() {
        return Err(ClusterError::DimensionMismatch {
            expected: centroids.k() * centroids.dim(),
            actual: acc.k() * acc.dim(),
        });
    }
    Ok(())
}

/// Assign one chunk of row-major values into a fresh accumulator
fn assign_chunk(
    chunk: &[f64],
    centroids: &CentroidSet,
) -> Result<ClusterAccumulator, ClusterError> {
    let mut partial = ClusterAccumulator::new(centroids.k(), centroids.dim())?;
    for point in chunk.chunks_exact(centroids.dim()) {
        partial.add_point(nearest_centroid(point, centroids), point);
    }
    Ok(partial)
}

/// Run the assignment pass on the calling thread
///
/// `acc` is reset first; on return it holds this round's local sums and counts.
pub fn assign_points(
    shard: &Shard,
    centroids: &CentroidSet,
    acc: &mut ClusterAccumulator,
) -> Result<(), ClusterError> {
    check_shapes(shard, centroids, acc)?;
    acc.reset();
    if shard.is_empty() {
        return Ok(());
    }

    for chunk in shard.values().chunks(ASSIGN_CHUNK_POINTS * shard.dim()) {
        let partial = assign_chunk(chunk, centroids)?;
        acc.merge(&partial)?;
    }
    Ok(())
}

/// Run the assignment pass on a rayon pool
///
/// Produces the same accumulator as [`assign_points`].
pub fn assign_points_parallel(
    shard: &Shard,
    centroids: &CentroidSet,
    acc: &mut ClusterAccumulator,
    pool: &rayon::ThreadPool,
) -> Result<(), ClusterError> {
    check_shapes(shard, centroids, acc)?;
    acc.reset();
    if shard.is_empty() {
        return Ok(());
    }

    // collect() keeps chunk order, so the serial merge below is deterministic
    let partials: Vec<ClusterAccumulator> = pool.install(|| {
        shard
            .values()
            .par_chunks(ASSIGN_CHUNK_POINTS * shard.dim())
            .map(|chunk| assign_chunk(chunk, centroids))
            .collect::<Result<Vec<_>, _>>()
    })?;

    for partial in &partials {
        acc.merge(partial)?;
    }
    Ok(())
}
