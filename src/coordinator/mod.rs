//! Local coordinator
//!
//! Runs every worker of the group as a thread of this process, connected by
//! the in-process [`LocalGroup`]. Rank 0's thread acts as the coordinator;
//! the caller only spawns and joins.

use crate::cluster::ClusterOutcome;
use crate::comm::{LocalGroup, WorkerGroup};
use crate::config::validator::validate_world;
use crate::config::Config;
use crate::worker::{load_input, prepare_shard, run_worker};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;

/// Coordinator-side result of a run, in either mode
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Rank 0's outcome, carrying the per-round history
    pub outcome: ClusterOutcome,
    /// Workers including the coordinator
    pub world_size: usize,
    /// Points each worker owned after truncation
    pub points_per_worker: usize,
    /// Configuration as run (input file dimensions resolved)
    pub config: Config,
}

/// Runs a complete group of worker threads
pub struct LocalCoordinator {
    config: Config,
}

impl LocalCoordinator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run all workers to completion
    ///
    /// Any failed worker fails the run. Its peers observe the closed channel
    /// and stop instead of waiting forever.
    pub fn run(self) -> Result<RunReport> {
        let mut config = self.config;
        let world_size = config.workers.count;

        let points = load_input(&mut config)?.map(Arc::new);
        if let Some(ref values) = points {
            println!(
                "Loaded {} points (dim={}) from input",
                values.len() / config.clustering.dim,
                config.clustering.dim
            );
        }
        validate_world(&config, world_size)?;

        let points_per_worker = config.shard_spec().points_per_worker(world_size);
        let group = LocalGroup::create(world_size, config.collective_timeout())?;
        let config = Arc::new(config);

        if config.runtime.debug {
            eprintln!(
                "DEBUG: spawning {} workers, {} points each, {} assignment thread(s) per worker",
                world_size, points_per_worker, config.assign_threads()
            );
        }

        let mut handles = Vec::with_capacity(world_size);
        for mut member in group {
            let rank = member.rank();
            let config = config.clone();
            let points = points.clone();

            let handle = std::thread::Builder::new()
                .name(format!("dkmeans-worker-{}", rank))
                .spawn(move || -> Result<ClusterOutcome> {
                    let shard = prepare_shard(&config, points.as_deref().map(Vec::as_slice), rank, world_size)?;
                    run_worker(&config, &mut member, &shard)
                })
                .with_context(|| format!("Failed to spawn worker thread {}", rank))?;
            handles.push((rank, handle));
        }

        let mut coordinator_outcome = None;
        let mut failures = Vec::new();
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(outcome)) => {
                    if rank == 0 {
                        coordinator_outcome = Some(outcome);
                    }
                }
                Ok(Err(e)) => failures.push(format!("rank {}: {:#}", rank, e)),
                Err(_) => failures.push(format!("rank {}: worker thread panicked", rank)),
            }
        }

        if !failures.is_empty() {
            anyhow::bail!(
                "{} of {} workers failed:\n  {}",
                failures.len(),
                world_size,
                failures.join("\n  ")
            );
        }

        let outcome = coordinator_outcome.context("Coordinator produced no outcome")?;
        let config = Arc::try_unwrap(config).unwrap_or_else(|shared| (*shared).clone());

        Ok(RunReport {
            outcome,
            world_size,
            points_per_worker,
            config,
        })
    }
}
