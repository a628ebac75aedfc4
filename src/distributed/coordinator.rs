//! Distributed coordinator
//!
//! This module implements the coordinator (rank 0) for distributed mode.
//! The coordinator:
//! - Builds its own shard
//! - Connects to all nodes and assigns ranks 1..=n in address order
//! - Distributes configuration and waits for every node to be READY
//! - Runs the rounds as a worker, reducing and broadcasting over the sockets
//! - Sends FINISH

use crate::comm::TcpWorkerGroup;
use crate::config::validator::validate_world;
use crate::config::Config;
use crate::coordinator::RunReport;
use crate::distributed::protocol::*;
use crate::worker::{load_input, prepare_shard, run_worker};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;

/// Distributed coordinator
///
/// Orchestrates a clustering run across multiple nodes.
pub struct DistributedCoordinator {
    /// Run configuration
    config: Config,

    /// List of node addresses (IP:port), in rank order
    node_addresses: Vec<String>,
}

impl DistributedCoordinator {
    /// Create a new distributed coordinator
    pub fn new(config: Config, node_addresses: Vec<String>) -> Result<Self> {
        if node_addresses.is_empty() {
            anyhow::bail!("No nodes specified for distributed mode");
        }

        Ok(Self {
            config,
            node_addresses,
        })
    }

    /// Run the distributed clustering job
    ///
    /// Blocks until the last round completes on every node.
    pub fn run(self) -> Result<RunReport> {
        println!("Distributed Coordinator");
        println!();

        let mut config = self.config;
        let world_size = self.node_addresses.len() + 1;
        config.workers.count = world_size;

        let points = load_input(&mut config)?;
        if points.is_some() {
            println!(
                "Loaded {} points (dim={}) from input",
                config.clustering.total_points, config.clustering.dim
            );
        }
        validate_world(&config, world_size)?;

        let shard = prepare_shard(&config, points.as_deref(), 0, world_size)?;
        drop(points);
        println!("✅ Coordinator shard ready ({} points)", shard.len());

        let runtime = Arc::new(Runtime::new().context("Failed to create tokio runtime")?);
        let peers = runtime.block_on(connect_and_configure(&self.node_addresses, &config, world_size))?;

        println!();
        println!(
            "Running {} rounds across {} workers (k={}, dim={})...",
            config.clustering.max_rounds, world_size, config.clustering.k, config.clustering.dim
        );

        let node_id = get_node_id();
        let mut group = TcpWorkerGroup::coordinator(runtime, peers, config.collective_timeout());
        let outcome = match run_worker(&config, &mut group, &shard) {
            Ok(outcome) => outcome,
            Err(e) => {
                group.report_error(&node_id, &format!("{:#}", e));
                return Err(e);
            }
        };

        group.finish().context("Failed to finish run")?;
        println!("✅ All {} rounds complete, sent FINISH to all nodes", outcome.rounds);
        println!();

        let points_per_worker = shard.len();
        Ok(RunReport {
            outcome,
            world_size,
            points_per_worker,
            config,
        })
    }
}

/// Connect to every node, send CONFIG, and wait for READY
///
/// Returns the connections in rank order.
async fn connect_and_configure(
    node_addresses: &[String],
    config: &Config,
    world_size: usize,
) -> Result<Vec<TcpStream>> {
    println!("Connecting to {} nodes...", node_addresses.len());

    let mut connections = Vec::with_capacity(node_addresses.len());
    for (index, addr) in node_addresses.iter().enumerate() {
        let rank = index + 1;
        println!("  Connecting to rank {} ({})...", rank, addr);
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        stream
            .set_nodelay(true)
            .with_context(|| format!("Failed to set TCP_NODELAY for {}", addr))?;
        println!("  ✅ Connected to rank {} ({})", rank, addr);
        connections.push(stream);
    }

    println!();
    println!("Sending configuration to all nodes...");
    for (index, stream) in connections.iter_mut().enumerate() {
        let rank = index + 1;
        let msg = Message::Config(ConfigMessage {
            protocol_version: PROTOCOL_VERSION,
            rank,
            world_size,
            config: config.clone(),
        });
        write_message(stream, &msg)
            .await
            .with_context(|| format!("Failed to send CONFIG to rank {}", rank))?;
        if config.runtime.debug {
            eprintln!("DEBUG: sent CONFIG to rank {}", rank);
        }
    }

    println!();
    println!("Waiting for all nodes to be ready...");
    for (index, stream) in connections.iter_mut().enumerate() {
        let rank = index + 1;
        match read_message(stream)
            .await
            .with_context(|| format!("Failed to read READY from rank {}", rank))?
        {
            Message::Ready(ready) => {
                if ready.protocol_version != PROTOCOL_VERSION {
                    anyhow::bail!(
                        "Protocol version mismatch: coordinator={}, rank {} ({})={}",
                        PROTOCOL_VERSION,
                        rank,
                        ready.node_id,
                        ready.protocol_version
                    );
                }
                if ready.rank != rank {
                    anyhow::bail!("Node {} answered as rank {}, expected {}", ready.node_id, ready.rank, rank);
                }
                println!(
                    "  ✅ Rank {} ready on {} ({} points)",
                    rank, ready.node_id, ready.shard_points
                );
            }
            Message::Error(err) => {
                anyhow::bail!("Rank {} ({}) failed to start: {}", rank, err.node_id, err.error);
            }
            other => anyhow::bail!("Expected READY from rank {}, got {}", rank, message_kind(&other)),
        }
    }

    println!();
    println!("All nodes ready!");
    Ok(connections)
}

/// Node identifier for error reports
pub(crate) fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
