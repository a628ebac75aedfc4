//! Collective communication between workers
//!
//! The clustering engine needs exactly two collectives per round:
//!
//! - **reduce_sum**: every worker contributes its [`ClusterAccumulator`]; the
//!   element-wise sum lands on the coordinator only.
//! - **broadcast**: the coordinator sends one [`CentroidSet`]; every worker
//!   returns with an identical copy.
//!
//! Both are blocking barriers. The [`WorkerGroup`] trait is the seam between
//! the algorithm and the substrate that moves the bytes:
//!
//! - `local`: one worker per thread, crossbeam channels
//! - `tcp`: one worker per process, length-prefixed MessagePack over TCP
//!
//! # Topology
//!
//! Both substrates use a star rooted at the coordinator (rank 0):
//!
//! ```text
//!            reduce_sum                    broadcast
//!   rank 1 ──acc──┐                   ┌──centroids──> rank 1
//!   rank 2 ──acc──┼──> rank 0   rank 0┼──centroids──> rank 2
//!   rank 3 ──acc──┘                   └──centroids──> rank 3
//! ```
//!
//! The coordinator folds contributions in rank order, so the floating-point
//! sum is the same on every run.
//!
//! # Failure Model
//!
//! A participant that never reaches a collective blocks the others forever
//! unless a collective timeout is configured, in which case the wait ends
//! with [`ClusterError::CollectiveTimeout`](crate::error::ClusterError). A
//! peer whose channel or socket closes is reported as an error rather than a
//! hang. Nothing is retried and no partial result is recovered.

pub mod local;
pub mod tcp;

use crate::cluster::{CentroidSet, ClusterAccumulator};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use local::LocalGroup;
pub use tcp::TcpWorkerGroup;

/// Rank of the coordinator
pub const COORDINATOR_RANK: usize = 0;

/// Which collective exchange a message belongs to
///
/// Tags every contribution and broadcast so a desynchronized peer is caught
/// instead of silently mixing rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Distribution of the initial first-K centroids
    Seed,
    /// Round `n` (0-based)
    Round(usize),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Seed => write!(f, "seed"),
            Phase::Round(n) => write!(f, "round {}", n),
        }
    }
}

/// A group of cooperating workers
///
/// Every member must call the collectives in the same order with the same
/// phase. Calls block until the collective completes for this member.
pub trait WorkerGroup {
    /// This worker's rank in `0..size()`
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn size(&self) -> usize;

    /// Whether this worker recomputes and broadcasts centroids
    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR_RANK
    }

    /// Sum `local` across all workers
    ///
    /// Returns `Some(global)` on the coordinator and `None` on every other
    /// worker.
    fn reduce_sum(&mut self, phase: Phase, local: &ClusterAccumulator) -> Result<Option<ClusterAccumulator>>;

    /// Distribute the coordinator's centroids to every worker
    ///
    /// The coordinator passes `Some(centroids)`; other workers pass `None`
    /// and receive the coordinator's value.
    fn broadcast(&mut self, phase: Phase, centroids: Option<&CentroidSet>) -> Result<CentroidSet>;
}
