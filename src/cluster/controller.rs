//! Iteration controller
//!
//! Drives a worker through a fixed number of rounds:
//!
//! ```text
//! Initializing ──seed + broadcast──> Running { 0 } ──> ... ──> Running { max-1 } ──> Terminated
//! ```
//!
//! Every member of the group runs its own controller. The controllers stay in
//! lock-step because each round ends in the broadcast barrier.

use super::{
    aggregate_round, assign_points, assign_points_parallel, CentroidSet, ClusterAccumulator, Shard,
};
use crate::comm::{Phase, WorkerGroup};
use crate::Result;
use anyhow::Context;
use std::time::{Duration, Instant};

/// Where a controller is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Centroids not yet seeded
    Initializing,
    /// Executing round `round` (0-based)
    Running { round: usize },
    /// All rounds complete, or the run failed
    Terminated,
}

/// Coordinator's record of one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: usize,
    /// Points assigned across all workers
    pub assigned: u64,
    pub empty_clusters: usize,
    /// Largest distance any centroid moved
    pub max_shift: f64,
    /// Wall time from the start of assignment to the end of broadcast
    pub duration: Duration,
}

/// Result of a completed run on one worker
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Rank of the worker that produced this outcome
    pub rank: usize,
    /// Final centroids, identical on every worker
    pub centroids: CentroidSet,
    /// Rounds completed
    pub rounds: usize,
    /// Wall time of the round loop, excluding shard generation and seeding
    pub elapsed: Duration,
    /// Per-round history; empty except on the coordinator
    pub history: Vec<RoundSummary>,
}

/// Runs the round loop for one worker
pub struct IterationController {
    k: usize,
    max_rounds: usize,
    pool: Option<rayon::ThreadPool>,
    state: ControllerState,
    debug: bool,
}

impl IterationController {
    /// Create a controller for `k` clusters and `max_rounds` rounds
    ///
    /// With `threads > 1` the assignment pass runs on a private rayon pool of
    /// that many threads.
    pub fn new(k: usize, max_rounds: usize, threads: usize) -> Result<Self> {
        if k == 0 {
            anyhow::bail!("k must be at least 1");
        }
        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("dkmeans-assign-{}", i))
                    .build()
                    .context("Failed to build assignment thread pool")?,
            )
        } else {
            None
        };
        Ok(Self {
            k,
            max_rounds,
            pool,
            state: ControllerState::Initializing,
            debug: false,
        })
    }

    /// Print per-round DEBUG lines
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Run every round to completion
    ///
    /// Must be called exactly once, by every member of `group`, with that
    /// member's shard. The controller ends in [`ControllerState::Terminated`]
    /// whether the run succeeds or fails.
    pub fn run<G: WorkerGroup + ?Sized>(&mut self, group: &mut G, shard: &Shard) -> Result<ClusterOutcome> {
        if self.state != ControllerState::Initializing {
            anyhow::bail!("controller already ran (state {:?})", self.state);
        }
        let result = self.run_rounds(group, shard);
        self.state = ControllerState::Terminated;
        result
    }

    fn run_rounds<G: WorkerGroup + ?Sized>(&mut self, group: &mut G, shard: &Shard) -> Result<ClusterOutcome> {
        let rank = group.rank();

        // Only the coordinator's shard seeds; the rest learn the centroids by broadcast
        let mut centroids = if group.is_coordinator() {
            let seeded = CentroidSet::seed_from_shard(shard, self.k)
                .context("Failed to seed centroids from the coordinator's shard")?;
            group.broadcast(Phase::Seed, Some(&seeded))?
        } else {
            group.broadcast(Phase::Seed, None)?
        };

        if centroids.k() != self.k || centroids.dim() != shard.dim() {
            anyhow::bail!(
                "rank {} received {}x{} seed centroids, expected {}x{}",
                rank,
                centroids.k(),
                centroids.dim(),
                self.k,
                shard.dim()
            );
        }

        let mut acc = ClusterAccumulator::new(self.k, shard.dim())?;
        let mut history = Vec::new();
        let start = Instant::now();

        for round in 0..self.max_rounds {
            self.state = ControllerState::Running { round };
            let round_start = Instant::now();

            match &self.pool {
                Some(pool) => assign_points_parallel(shard, &centroids, &mut acc, pool)?,
                None => assign_points(shard, &centroids, &mut acc)?,
            }

            let outcome = aggregate_round(group, round, &acc, &mut centroids)
                .with_context(|| format!("Rank {} failed in round {}", rank, round))?;
            let duration = round_start.elapsed();

            if let (Some(assigned), Some(empty_clusters), Some(max_shift)) =
                (outcome.assigned, outcome.empty_clusters, outcome.max_shift)
            {
                if self.debug {
                    eprintln!(
                        "DEBUG: round {}: assigned={} empty={} max_shift={:.6} time={:?}",
                        round, assigned, empty_clusters, max_shift, duration
                    );
                }
                history.push(RoundSummary {
                    round,
                    assigned,
                    empty_clusters,
                    max_shift,
                    duration,
                });
            }
        }

        Ok(ClusterOutcome {
            rank,
            centroids,
            rounds: self.max_rounds,
            elapsed: start.elapsed(),
            history,
        })
    }
}
