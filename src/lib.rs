//! dkmeans - Distributed k-means clustering
//!
//! dkmeans runs Lloyd's k-means over a point set partitioned across a group
//! of workers. Each round, every worker assigns its own points, the partial
//! sums are reduced onto rank 0, and the recomputed centroids are broadcast
//! back, so all replicas stay identical.
//!
//! # Architecture
//!
//! - **Clustering core** (`cluster`): shards, centroids, accumulators, and the round loop
//! - **Collectives** (`comm`): reduce and broadcast over threads or TCP
//! - **Local mode** (`coordinator`): all workers as threads of one process
//! - **Distributed mode** (`distributed`): one worker per node, coordinated over TCP
//! - **Reporting** (`stats`, `output`): round timing, console, CSV, and JSON output

pub mod cluster;
pub mod comm;
pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod error;
pub mod output;
pub mod stats;
pub mod worker;

// Re-export commonly used types
pub use cluster::{CentroidSet, ClusterAccumulator, ClusterOutcome, IterationController, Shard};
pub use comm::{Phase, WorkerGroup};
pub use config::Config;
pub use error::ClusterError;

/// Result type used throughout dkmeans
pub type Result<T> = anyhow::Result<T>;
