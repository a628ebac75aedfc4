//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{parse_count, parse_duration};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Build the run configuration from `--config` (if any) and CLI flags
pub fn build_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Override clustering settings
    if let Some(ref points) = cli.points {
        config.clustering.total_points = parse_count(points).context("Invalid --points")?;
    }
    if let Some(dim) = cli.dim {
        config.clustering.dim = dim;
    }
    if let Some(k) = cli.clusters {
        config.clustering.k = k;
    }
    if let Some(rounds) = cli.rounds {
        config.clustering.max_rounds = rounds;
    }

    // Override data settings
    if let Some(seed) = cli.seed {
        config.data.base_seed = seed;
    }
    if let Some(ref input) = cli.input {
        config.data.input = Some(input.clone());
    }
    if let Some(ref dir) = cli.export_shards {
        config.data.export_shards = Some(dir.clone());
    }

    // Override worker settings
    if let Some(count) = cli.workers {
        config.workers.count = count;
    }
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }

    // Override output settings
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if let Some(ref path) = cli.centroids_csv {
        config.output.centroids_csv = Some(path.clone());
    }
    if cli.show_rounds {
        config.output.show_rounds = true;
    }

    // Override runtime settings
    if let Some(ref timeout) = cli.collective_timeout {
        let secs = parse_duration(timeout).context("Invalid --collective-timeout")?;
        config.runtime.collective_timeout_secs = Some(secs);
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}
