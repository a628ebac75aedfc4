//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::cluster::shard::{ShardSpec, DEFAULT_BASE_SEED};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Problem size and iteration budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Points across all workers, before per-worker truncation
    #[serde(default = "default_total_points")]
    pub total_points: usize,
    /// Coordinates per point
    #[serde(default = "default_dim")]
    pub dim: usize,
    /// Number of clusters
    #[serde(default = "default_k")]
    pub k: usize,
    /// Fixed number of rounds
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

fn default_total_points() -> usize {
    1_000_000
}

fn default_dim() -> usize {
    10
}

fn default_k() -> usize {
    20
}

fn default_max_rounds() -> usize {
    300
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            total_points: default_total_points(),
            dim: default_dim(),
            k: default_k(),
            max_rounds: default_max_rounds(),
        }
    }
}

/// Where points come from and where shards go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Seed that each worker offsets by its rank
    #[serde(default = "default_base_seed")]
    pub base_seed: u64,
    /// CSV point set to cluster instead of synthetic points
    ///
    /// In distributed mode every node reads this path locally.
    pub input: Option<PathBuf>,
    /// Directory to write each worker's shard to as `shard_<rank>.csv`
    pub export_shards: Option<PathBuf>,
}

fn default_base_seed() -> u64 {
    DEFAULT_BASE_SEED
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_seed: default_base_seed(),
            input: None,
            export_shards: None,
        }
    }
}

/// Worker layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Workers in local mode (ignored in distributed mode, where it is 1 + nodes)
    #[serde(default = "default_count")]
    pub count: usize,
    /// Assignment threads inside each worker; 0 uses every core of the worker's machine
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_count() -> usize {
    4
}

fn default_threads() -> usize {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            threads: default_threads(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON run report path
    pub json_output: Option<PathBuf>,
    /// Final centroids as CSV
    pub centroids_csv: Option<PathBuf>,
    /// Print the per-round history table
    #[serde(default)]
    pub show_rounds: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bound on each collective wait; `None` waits forever
    pub collective_timeout_secs: Option<u64>,
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Shard generation parameters
    pub fn shard_spec(&self) -> ShardSpec {
        ShardSpec {
            total_points: self.clustering.total_points,
            dim: self.clustering.dim,
            base_seed: self.data.base_seed,
        }
    }

    /// Assignment threads for a worker on this machine
    pub fn assign_threads(&self) -> usize {
        match self.workers.threads {
            0 => num_cpus::get(),
            threads => threads,
        }
    }

    /// Collective timeout, if one is configured
    pub fn collective_timeout(&self) -> Option<Duration> {
        self.runtime.collective_timeout_secs.map(Duration::from_secs)
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Clustering: {}", self.clustering)?;
        writeln!(f, "  Data: {}", self.data)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Output: {}", self.output)?;
        write!(f, "  Runtime: {}", self.runtime)
    }
}

impl fmt::Display for ClusteringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} points, dim={}, k={}, {} rounds",
            self.total_points, self.dim, self.k, self.max_rounds
        )
    }
}

impl fmt::Display for DataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.input {
            Some(ref path) => write!(f, "input={}", path.display())?,
            None => write!(f, "synthetic, base_seed={}", self.base_seed)?,
        }
        if let Some(ref dir) = self.export_shards {
            write!(f, ", export_shards={}", dir.display())?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.threads {
            0 => write!(f, "{} worker(s), all cores each", self.count),
            threads => write!(f, "{} worker(s), {} thread(s) each", self.count, threads),
        }
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref path) = self.json_output {
            parts.push(format!("json={}", path.display()));
        }
        if let Some(ref path) = self.centroids_csv {
            parts.push(format!("centroids_csv={}", path.display()));
        }
        if self.show_rounds {
            parts.push("show_rounds".to_string());
        }
        if parts.is_empty() {
            write!(f, "text output")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(secs) = self.collective_timeout_secs {
            parts.push(format!("collective_timeout={}s", secs));
        }
        if self.dry_run {
            parts.push("dry_run".to_string());
        }
        if self.debug {
            parts.push("debug".to_string());
        }
        if parts.is_empty() {
            write!(f, "default")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}
