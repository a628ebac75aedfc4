//! Domain errors
//!
//! Most of the crate propagates `anyhow::Error` with context attached at each
//! step. The variants here are the failures a caller may want to match on.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the clustering engine and its collectives
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Storage for a shard, accumulator, or centroid set could not be reserved
    #[error("memory allocation failed for {what} ({bytes} bytes)")]
    Allocation { what: &'static str, bytes: usize },

    /// Two vectors that must share a dimensionality do not
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The coordinator's shard cannot seed `k` centroids
    #[error("coordinator shard has {points} points, need at least k={k} to seed centroids")]
    ShardTooSmall { points: usize, k: usize },

    /// A collective did not complete within the configured bound
    #[error("{collective} timed out after {waited:?} waiting for rank {rank}")]
    CollectiveTimeout {
        collective: &'static str,
        rank: usize,
        waited: Duration,
    },

    /// A peer hung up in the middle of a run
    #[error("rank {rank} disconnected during {collective}")]
    PeerDisconnected { collective: &'static str, rank: usize },

    /// A peer sent a message that does not belong at this point of the run
    #[error("protocol error from rank {rank}: {detail}")]
    Protocol { rank: usize, detail: String },
}
