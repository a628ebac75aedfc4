//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_clustering(&config.clustering, config.data.input.is_some())?;
    validate_data(&config.data)?;
    validate_workers(&config.workers)?;
    validate_output(&config.output)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate clustering configuration
///
/// `total_points` is not checked when points come from an input file.
pub fn validate_clustering(clustering: &ClusteringConfig, has_input: bool) -> Result<()> {
    if clustering.k == 0 {
        anyhow::bail!("k must be at least 1");
    }

    if clustering.dim == 0 {
        anyhow::bail!("dim must be at least 1");
    }

    if !has_input && clustering.total_points == 0 {
        anyhow::bail!("total_points must be at least 1");
    }

    if clustering.max_rounds == 0 {
        eprintln!("Warning: max_rounds is 0, the seed centroids will be reported unchanged");
    }

    Ok(())
}

/// Validate data configuration
pub fn validate_data(data: &DataConfig) -> Result<()> {
    if let Some(ref input) = data.input {
        if !input.is_file() {
            anyhow::bail!("input file not found: {}", input.display());
        }
    }

    if let Some(ref dir) = data.export_shards {
        if dir.is_file() {
            anyhow::bail!("export_shards must be a directory, got file: {}", dir.display());
        }
    }

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 {
        anyhow::bail!("workers.count must be at least 1");
    }

    // Warn if thread count is very high
    if workers.threads > 1024 {
        eprintln!(
            "Warning: Very high thread count ({}), this may cause performance issues",
            workers.threads
        );
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let (Some(json), Some(csv)) = (&output.json_output, &output.centroids_csv) {
        if json == csv {
            anyhow::bail!("json_output and centroids_csv must be different files");
        }
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if runtime.collective_timeout_secs == Some(0) {
        anyhow::bail!("collective_timeout_secs must be greater than 0 if specified");
    }

    Ok(())
}

/// Validate that a run over `world_size` workers can seed `k` centroids
///
/// The coordinator seeds from its own shard, so each shard needs at least `k`
/// points after truncation. With an input file, call this after the file is
/// loaded so `total_points` describes it.
pub fn validate_world(config: &Config, world_size: usize) -> Result<()> {
    if world_size == 0 {
        anyhow::bail!("worker group needs at least one worker");
    }

    let per_worker = config.shard_spec().points_per_worker(world_size);
    if per_worker < config.clustering.k {
        anyhow::bail!(
            "{} points over {} workers gives {} points per shard, fewer than k={}",
            config.clustering.total_points,
            world_size,
            per_worker,
            config.clustering.k
        );
    }

    Ok(())
}
