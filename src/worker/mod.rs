//! Worker lifecycle
//!
//! Everything one rank does between receiving its configuration and returning
//! its outcome, independent of how the group is connected:
//!
//! 1. Obtain the shard: generate it, or slice it out of an input point set
//! 2. Export the shard as CSV if requested
//! 3. Run the iteration controller over the worker group
//!
//! Local mode calls this once per thread; distributed mode once per process.

use crate::cluster::{generate_shard, ClusterOutcome, IterationController, Shard};
use crate::comm::WorkerGroup;
use crate::config::Config;
use crate::error::ClusterError;
use crate::output::csv::{read_points, write_shard};
use crate::Result;
use anyhow::Context;

/// Load `config.data.input` and make the configuration describe it
///
/// Sets `clustering.dim` and `clustering.total_points` from the file. Returns
/// `None` when points are synthetic.
pub fn load_input(config: &mut Config) -> Result<Option<Vec<f64>>> {
    let path = match config.data.input {
        Some(ref path) => path.clone(),
        None => return Ok(None),
    };

    let (dim, values) = read_points(&path)?;
    config.clustering.dim = dim;
    config.clustering.total_points = values.len() / dim;
    Ok(Some(values))
}

/// Load `config.data.input` on a node and check it matches the coordinator's
///
/// Every node reads its own copy of the file, so a differing copy would give
/// the workers inconsistent shards.
pub fn load_input_checked(config: &Config) -> Result<Option<Vec<f64>>> {
    let mut local = config.clone();
    let values = match load_input(&mut local)? {
        Some(values) => values,
        None => return Ok(None),
    };

    if local.clustering.dim != config.clustering.dim {
        return Err(ClusterError::DimensionMismatch {
            expected: config.clustering.dim,
            actual: local.clustering.dim,
        })
        .context("Input file differs from the coordinator's copy");
    }
    if local.clustering.total_points != config.clustering.total_points {
        anyhow::bail!(
            "Input file has {} points here but {} on the coordinator",
            local.clustering.total_points,
            config.clustering.total_points
        );
    }
    Ok(Some(values))
}

/// Build worker `rank`'s shard and export it if configured
///
/// `points` is the loaded input set, or `None` for synthetic points.
pub fn prepare_shard(config: &Config, points: Option<&[f64]>, rank: usize, world_size: usize) -> Result<Shard> {
    let shard = match points {
        Some(values) => Shard::from_points_slice(values, config.clustering.dim, rank, world_size)?,
        None => generate_shard(&config.shard_spec(), rank, world_size)?,
    };

    if let Some(ref dir) = config.data.export_shards {
        let path = write_shard(dir, rank, &shard)
            .with_context(|| format!("Failed to export shard for rank {}", rank))?;
        if config.runtime.debug {
            eprintln!("DEBUG: rank {} exported {} points to {}", rank, shard.len(), path.display());
        }
    }

    Ok(shard)
}

/// Run the round loop for one member of `group`
pub fn run_worker<G: WorkerGroup + ?Sized>(config: &Config, group: &mut G, shard: &Shard) -> Result<ClusterOutcome> {
    let mut controller = IterationController::new(
        config.clustering.k,
        config.clustering.max_rounds,
        config.assign_threads(),
    )?
    .with_debug(config.runtime.debug && group.is_coordinator());

    controller
        .run(group, shard)
        .with_context(|| format!("Worker rank {} failed", group.rank()))
}
