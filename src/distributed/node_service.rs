//! Node service for distributed mode
//!
//! This module implements the node service that runs on each node in distributed mode.
//! The node service:
//! - Listens for connections from the coordinator
//! - Receives its rank and the run configuration
//! - Builds its shard and reports READY
//! - Runs the rounds as one worker of the group
//! - Waits for FINISH, then accepts the next run

use crate::cluster::ClusterOutcome;
use crate::comm::TcpWorkerGroup;
use crate::distributed::coordinator::get_node_id;
use crate::distributed::protocol::*;
use crate::worker::{load_input_checked, prepare_shard, run_worker};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

/// Node service
///
/// Runs on each node in distributed mode, accepting runs from the coordinator.
pub struct NodeService {
    /// Port to listen on (0 picks a free port)
    listen_port: u16,

    /// Node identifier (hostname)
    node_id: String,
}

impl NodeService {
    /// Create a new node service
    pub fn new(listen_port: u16) -> Result<Self> {
        Ok(Self {
            listen_port,
            node_id: get_node_id(),
        })
    }

    /// Run the node service
    ///
    /// Serves one run at a time, forever. A failed run is reported and the
    /// service goes back to waiting.
    pub fn run(self) -> Result<()> {
        let runtime = Arc::new(Runtime::new().context("Failed to create tokio runtime")?);
        let listener = self.bind(&runtime)?;

        println!("Node service listening on port {}", self.listen_port);
        println!("Node ID: {}", self.node_id);
        println!("Waiting for coordinator connection...");

        loop {
            match self.serve_one(&runtime, &listener) {
                Ok(outcome) => println!(
                    "✅ Run complete ({} rounds in {:.3}s). Waiting for next connection...",
                    outcome.rounds,
                    outcome.elapsed.as_secs_f64()
                ),
                Err(e) => {
                    eprintln!("Run failed: {:#}", e);
                    println!("Waiting for next connection...");
                }
            }
        }
    }

    /// Bind the listening socket on all interfaces
    pub fn bind(&self, runtime: &Runtime) -> Result<TcpListener> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        runtime
            .block_on(TcpListener::bind(&addr))
            .with_context(|| format!("Failed to bind node service to {}", addr))
    }

    /// Accept one coordinator connection and serve its run to completion
    pub fn serve_one(&self, runtime: &Arc<Runtime>, listener: &TcpListener) -> Result<ClusterOutcome> {
        let (stream, addr) = runtime
            .block_on(listener.accept())
            .context("Failed to accept connection")?;
        println!("Coordinator connected from: {}", addr);
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        self.handle_run(runtime, stream)
    }

    /// Handle a single run on an accepted connection
    fn handle_run(&self, runtime: &Arc<Runtime>, mut stream: TcpStream) -> Result<ClusterOutcome> {
        let config_msg = match runtime
            .block_on(read_message(&mut stream))
            .context("Failed to read CONFIG")?
        {
            Message::Config(msg) => msg,
            other => anyhow::bail!("Expected CONFIG, got {}", message_kind(&other)),
        };

        if config_msg.protocol_version != PROTOCOL_VERSION {
            let error = format!(
                "Protocol version mismatch: coordinator={}, node={}",
                config_msg.protocol_version, PROTOCOL_VERSION
            );
            self.send_error(runtime, &mut stream, config_msg.rank, &error);
            anyhow::bail!(error);
        }

        let ConfigMessage {
            rank,
            world_size,
            config,
            ..
        } = config_msg;

        if rank == 0 || rank >= world_size {
            let error = format!("Invalid rank {} for world size {}", rank, world_size);
            self.send_error(runtime, &mut stream, rank, &error);
            anyhow::bail!(error);
        }

        println!("Received configuration:");
        println!("  Rank: {} of {}", rank, world_size);
        println!("{}", config);

        let shard = match load_input_checked(&config)
            .and_then(|points| prepare_shard(&config, points.as_deref(), rank, world_size))
        {
            Ok(shard) => shard,
            Err(e) => {
                self.send_error(runtime, &mut stream, rank, &format!("{:#}", e));
                return Err(e.context("Failed to prepare shard"));
            }
        };

        let ready = Message::Ready(ReadyMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: self.node_id.clone(),
            rank,
            shard_points: shard.len(),
        });
        runtime
            .block_on(write_message(&mut stream, &ready))
            .context("Failed to send READY")?;
        println!("✅ Shard ready ({} points), sent READY", shard.len());

        let mut group = TcpWorkerGroup::member(
            runtime.clone(),
            stream,
            rank,
            world_size,
            config.collective_timeout(),
        );
        let outcome = match run_worker(&config, &mut group, &shard) {
            Ok(outcome) => outcome,
            Err(e) => {
                group.report_error(&self.node_id, &format!("{:#}", e));
                return Err(e);
            }
        };

        group.finish().context("Coordinator did not finish the run")?;
        Ok(outcome)
    }

    /// Best-effort error report before a group exists
    fn send_error(&self, runtime: &Runtime, stream: &mut TcpStream, rank: usize, error: &str) {
        let msg = Message::Error(ErrorMessage {
            node_id: self.node_id.clone(),
            rank,
            error: error.to_string(),
        });
        let _ = runtime.block_on(write_message(stream, &msg));
    }
}
