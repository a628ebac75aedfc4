//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - every worker is a thread in this process
    Local,
    /// Coordinator mode - rank 0 of a distributed run
    Coordinator,
    /// Service mode - run service on node (accepts coordinator commands)
    Service,
}

/// dkmeans - Distributed k-means clustering
#[derive(Parser, Debug)]
#[command(name = "dkmeans")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, or service
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// Port for service to listen on (service mode only)
    #[arg(long, default_value = "9999")]
    pub listen_port: u16,

    /// Comma-separated list of node addresses for coordinator mode (e.g., "10.0.1.10:9999,10.0.1.11:9999")
    ///
    /// Nodes receive ranks 1..=n in list order.
    #[arg(long)]
    pub host_list: Option<String>,

    /// File containing list of node addresses (one per line, for coordinator mode)
    #[arg(long)]
    pub clients_file: Option<PathBuf>,

    /// Port to connect to on worker nodes (coordinator mode only)
    #[arg(long, default_value = "9999")]
    pub worker_port: u16,

    /// TOML configuration file (CLI flags override its values)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Clustering Options ===
    /// Total points across all workers (e.g., 1000000, 500k, 1M)
    #[arg(short = 'n', long)]
    pub points: Option<String>,

    /// Coordinates per point
    #[arg(short = 'd', long)]
    pub dim: Option<usize>,

    /// Number of clusters
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Number of rounds (no early stopping)
    #[arg(short = 'r', long)]
    pub rounds: Option<usize>,

    // === Data Options ===
    /// Base seed; worker r uses seed + r
    #[arg(long)]
    pub seed: Option<u64>,

    /// CSV point set to cluster instead of generating synthetic points
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Write each worker's shard to DIR/shard_<rank>.csv
    #[arg(long, value_name = "DIR")]
    pub export_shards: Option<PathBuf>,

    // === Worker Options ===
    /// Number of workers (local mode only)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Assignment threads per worker (0 = all cores)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    // === Output Options ===
    /// Write a JSON run report
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Write the final centroids as CSV
    #[arg(long)]
    pub centroids_csv: Option<PathBuf>,

    /// Print the per-round history
    #[arg(long)]
    pub show_rounds: bool,

    // === Runtime Options ===
    /// Abort if a collective waits longer than this (e.g., 30s, 5m); default waits forever
    #[arg(long)]
    pub collective_timeout: Option<String>,

    /// Validate and print the configuration without running
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        // Service mode doesn't need validation (coordinator sends config)
        if self.mode == ExecutionMode::Service {
            return Ok(());
        }

        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.mode == ExecutionMode::Coordinator {
            if self.workers.is_some() {
                anyhow::bail!("--workers applies to local mode; coordinator mode uses one worker per node plus itself");
            }
            match (&self.host_list, &self.clients_file) {
                (None, None) => anyhow::bail!("Coordinator mode requires --host-list or --clients-file"),
                (Some(_), Some(_)) => anyhow::bail!("Specify only one of --host-list or --clients-file"),
                _ => {}
            }
        }

        Ok(())
    }

    /// Node addresses for coordinator mode, in rank order
    pub fn node_addresses(&self) -> anyhow::Result<Vec<String>> {
        use anyhow::Context;

        let addresses = if let Some(ref host_list) = self.host_list {
            parse_node_list(host_list.split(','), self.worker_port)
        } else if let Some(ref clients_file) = self.clients_file {
            let content = std::fs::read_to_string(clients_file)
                .with_context(|| format!("Failed to read clients file: {}", clients_file.display()))?;
            parse_node_list(content.lines(), self.worker_port)
        } else {
            anyhow::bail!("Coordinator mode requires --host-list or --clients-file");
        };

        if addresses.is_empty() {
            anyhow::bail!("No nodes specified for distributed mode");
        }
        Ok(addresses)
    }
}

/// Normalize node entries, skipping blanks and `#` comments
///
/// Entries without a port get `default_port`.
fn parse_node_list<'a>(entries: impl Iterator<Item = &'a str>, default_port: u16) -> Vec<String> {
    entries
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
        .map(|addr| {
            if addr.contains(':') {
                addr.to_string()
            } else {
                format!("{}:{}", addr, default_port)
            }
        })
        .collect()
}
