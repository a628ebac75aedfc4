//! TCP worker group
//!
//! One worker per process. The coordinator holds one connection per node,
//! ordered by rank; each node holds its single connection to the coordinator.
//! Messages use the length-prefixed MessagePack framing from
//! [`crate::distributed::protocol`].
//!
//! The collectives are synchronous, so the group drives its sockets on a
//! tokio runtime it shares with the caller and blocks on each exchange.

use super::{Phase, WorkerGroup, COORDINATOR_RANK};
use crate::cluster::{CentroidSet, ClusterAccumulator};
use crate::distributed::protocol::{
    message_kind, read_message, write_message, AccumulatorMessage, CentroidsMessage, ErrorMessage, Message,
};
use crate::error::ClusterError;
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;

enum Role {
    /// Connections to ranks 1..size, indexed by `rank - 1`
    Coordinator { peers: Vec<TcpStream> },
    Member { stream: TcpStream },
}

/// Socket-backed [`WorkerGroup`] member
pub struct TcpWorkerGroup {
    rank: usize,
    size: usize,
    runtime: Arc<Runtime>,
    timeout: Option<Duration>,
    role: Role,
}

/// Read one message, bounded by the optional collective timeout
async fn read_from(
    stream: &mut TcpStream,
    timeout: Option<Duration>,
    collective: &'static str,
    peer: usize,
) -> Result<Message> {
    let read = read_message(stream);
    let msg = match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| ClusterError::CollectiveTimeout {
                collective,
                rank: peer,
                waited: limit,
            })?,
        None => read.await,
    };
    msg.map_err(|e| {
        if e.downcast_ref::<rmp_serde::decode::Error>().is_some() {
            anyhow::Error::from(ClusterError::Protocol {
                rank: peer,
                detail: format!("malformed message during {}: {:#}", collective, e),
            })
        } else {
            e.context(ClusterError::PeerDisconnected { collective, rank: peer })
        }
    })
}

/// Turn a message other than the expected one into an error
fn unexpected(msg: Message, peer: usize, expected: &str) -> anyhow::Error {
    match msg {
        Message::Error(e) => anyhow::anyhow!("Rank {} ({}) reported error: {}", e.rank, e.node_id, e.error),
        other => ClusterError::Protocol {
            rank: peer,
            detail: format!("expected {}, got {}", expected, message_kind(&other)),
        }
        .into(),
    }
}

impl TcpWorkerGroup {
    /// Coordinator side; `peers[i]` must be the connection to rank `i + 1`
    pub fn coordinator(runtime: Arc<Runtime>, peers: Vec<TcpStream>, timeout: Option<Duration>) -> Self {
        Self {
            rank: COORDINATOR_RANK,
            size: peers.len() + 1,
            runtime,
            timeout,
            role: Role::Coordinator { peers },
        }
    }

    /// Node side, after the node has accepted `rank` from the coordinator
    pub fn member(
        runtime: Arc<Runtime>,
        stream: TcpStream,
        rank: usize,
        size: usize,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            rank,
            size,
            runtime,
            timeout,
            role: Role::Member { stream },
        }
    }

    /// Close out the run
    ///
    /// The coordinator sends FINISH to every node; a node waits for it. Call
    /// once after the last round.
    pub fn finish(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let runtime = &self.runtime;
        let role = &mut self.role;
        runtime.block_on(async move {
            match role {
                Role::Coordinator { peers } => {
                    for (index, stream) in peers.iter_mut().enumerate() {
                        write_message(stream, &Message::Finish)
                            .await
                            .with_context(|| format!("Failed to send FINISH to rank {}", index + 1))?;
                    }
                    Ok(())
                }
                Role::Member { stream } => match read_from(stream, timeout, "finish", COORDINATOR_RANK).await? {
                    Message::Finish => Ok(()),
                    other => Err(unexpected(other, COORDINATOR_RANK, "FINISH")),
                },
            }
        })
    }

    /// Tell the other side this worker is giving up
    ///
    /// Best effort: the coordinator notifies every node, a node notifies the
    /// coordinator. Send failures are ignored since the run is already lost.
    pub fn report_error(&mut self, node_id: &str, error: &str) {
        let msg = Message::Error(ErrorMessage {
            node_id: node_id.to_string(),
            rank: self.rank,
            error: error.to_string(),
        });
        let runtime = &self.runtime;
        let role = &mut self.role;
        runtime.block_on(async move {
            match role {
                Role::Coordinator { peers } => {
                    for stream in peers.iter_mut() {
                        let _ = write_message(stream, &msg).await;
                    }
                }
                Role::Member { stream } => {
                    let _ = write_message(stream, &msg).await;
                }
            }
        });
    }
}

impl WorkerGroup for TcpWorkerGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn reduce_sum(&mut self, phase: Phase, local: &ClusterAccumulator) -> Result<Option<ClusterAccumulator>> {
        let rank = self.rank;
        let timeout = self.timeout;
        let runtime = &self.runtime;
        let role = &mut self.role;
        runtime.block_on(async move {
            match role {
                Role::Coordinator { peers } => {
                    let mut global = local.clone();
                    for (index, stream) in peers.iter_mut().enumerate() {
                        let peer = index + 1;
                        match read_from(stream, timeout, "reduce", peer).await? {
                            Message::Accumulator(m) if m.phase == phase && m.rank == peer => {
                                global.merge(&m.accumulator)?;
                            }
                            Message::Accumulator(m) => {
                                return Err(ClusterError::Protocol {
                                    rank: peer,
                                    detail: format!(
                                        "expected {} contribution from rank {}, got {} from rank {}",
                                        phase, peer, m.phase, m.rank
                                    ),
                                }
                                .into());
                            }
                            other => return Err(unexpected(other, peer, "ACCUMULATOR")),
                        }
                    }
                    Ok(Some(global))
                }
                Role::Member { stream } => {
                    let msg = Message::Accumulator(AccumulatorMessage {
                        rank,
                        phase,
                        accumulator: local.clone(),
                    });
                    write_message(stream, &msg)
                        .await
                        .with_context(|| ClusterError::PeerDisconnected {
                            collective: "reduce",
                            rank: COORDINATOR_RANK,
                        })?;
                    Ok(None)
                }
            }
        })
    }

    fn broadcast(&mut self, phase: Phase, centroids: Option<&CentroidSet>) -> Result<CentroidSet> {
        let timeout = self.timeout;
        let runtime = &self.runtime;
        let role = &mut self.role;
        runtime.block_on(async move {
            match role {
                Role::Coordinator { peers } => {
                    let centroids = centroids
                        .ok_or_else(|| anyhow::anyhow!("coordinator must supply centroids to broadcast"))?;
                    let msg = Message::Centroids(CentroidsMessage {
                        phase,
                        centroids: centroids.clone(),
                    });
                    for (index, stream) in peers.iter_mut().enumerate() {
                        write_message(stream, &msg)
                            .await
                            .with_context(|| ClusterError::PeerDisconnected {
                                collective: "broadcast",
                                rank: index + 1,
                            })?;
                    }
                    Ok(centroids.clone())
                }
                Role::Member { stream } => match read_from(stream, timeout, "broadcast", COORDINATOR_RANK).await? {
                    Message::Centroids(m) if m.phase == phase => Ok(m.centroids),
                    Message::Centroids(m) => Err(ClusterError::Protocol {
                        rank: COORDINATOR_RANK,
                        detail: format!("expected {} centroids, got {}", phase, m.phase),
                    }
                    .into()),
                    other => Err(unexpected(other, COORDINATOR_RANK, "CENTROIDS")),
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Coordinator plus `members` nodes connected over loopback
    fn connect(members: usize, timeout: Option<Duration>) -> (TcpWorkerGroup, Vec<TcpWorkerGroup>) {
        let runtime = Arc::new(Runtime::new().unwrap());
        let size = members + 1;

        let (peers, nodes) = runtime.block_on(async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let mut peers = Vec::new();
            let mut nodes = Vec::new();
            for _ in 0..members {
                let client = TcpStream::connect(addr).await.unwrap();
                let (server, _) = listener.accept().await.unwrap();
                peers.push(client);
                nodes.push(server);
            }
            (peers, nodes)
        });

        let coordinator = TcpWorkerGroup::coordinator(runtime.clone(), peers, timeout);
        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(i, stream)| TcpWorkerGroup::member(runtime.clone(), stream, i + 1, size, timeout))
            .collect();
        (coordinator, nodes)
    }

    fn accumulator_with(cluster: usize, value: f64) -> ClusterAccumulator {
        let mut acc = ClusterAccumulator::new(2, 1).unwrap();
        acc.add_point(cluster, &[value]);
        acc
    }

    #[test]
    fn test_reduce_broadcast_finish_over_loopback() {
        let (mut coordinator, nodes) = connect(2, None);
        assert_eq!(coordinator.size(), 3);
        assert!(coordinator.is_coordinator());

        let handles: Vec<_> = nodes
            .into_iter()
            .map(|mut node| {
                std::thread::spawn(move || {
                    let rank = node.rank();
                    assert!(node
                        .reduce_sum(Phase::Round(0), &accumulator_with(1, rank as f64))
                        .unwrap()
                        .is_none());
                    let received = node.broadcast(Phase::Round(0), None).unwrap();
                    node.finish().unwrap();
                    received
                })
            })
            .collect();

        let global = coordinator
            .reduce_sum(Phase::Round(0), &accumulator_with(0, 0.5))
            .unwrap()
            .unwrap();
        assert_eq!(global.counts(), &[1, 2]);
        assert_eq!(global.sum(1), &[3.0]);

        let centroids = CentroidSet::from_values(2, 1, vec![0.5, 1.5]).unwrap();
        coordinator.broadcast(Phase::Round(0), Some(&centroids)).unwrap();
        coordinator.finish().unwrap();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), centroids);
        }
    }

    #[test]
    fn test_node_error_is_reported_to_coordinator() {
        let (mut coordinator, mut nodes) = connect(1, None);
        let mut node = nodes.pop().unwrap();

        node.report_error("node-x", "disk on fire");
        let err = coordinator
            .reduce_sum(Phase::Round(0), &accumulator_with(0, 0.5))
            .unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_coordinator_times_out_on_silent_node() {
        let (mut coordinator, _nodes) = connect(1, Some(Duration::from_millis(50)));

        let err = coordinator
            .reduce_sum(Phase::Seed, &accumulator_with(0, 0.5))
            .unwrap_err();
        match err.downcast_ref::<ClusterError>() {
            Some(ClusterError::CollectiveTimeout { rank, .. }) => assert_eq!(*rank, 1),
            other => panic!("Expected CollectiveTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_node_detects_closed_coordinator() {
        let (coordinator, mut nodes) = connect(1, None);
        drop(coordinator);
        let mut node = nodes.pop().unwrap();

        let err = node.broadcast(Phase::Seed, None).unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn test_short_centroid_frame_is_rejected() {
        use serde::Serialize;
        use tokio::io::AsyncWriteExt;

        // Mirrors the wire layout of `Message::Centroids` without the shape checks
        #[derive(Serialize)]
        struct UncheckedCentroids {
            k: usize,
            dim: usize,
            values: Vec<f64>,
        }
        #[derive(Serialize)]
        struct UncheckedBroadcast {
            phase: Phase,
            centroids: UncheckedCentroids,
        }
        #[derive(Serialize)]
        enum UncheckedMessage {
            Centroids(UncheckedBroadcast),
        }

        let runtime = Arc::new(Runtime::new().unwrap());
        let (mut coordinator_side, node_side) = runtime.block_on(async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
            let (server, _) = listener.accept().await.unwrap();
            (client, server)
        });

        let body = rmp_serde::to_vec(&UncheckedMessage::Centroids(UncheckedBroadcast {
            phase: Phase::Seed,
            centroids: UncheckedCentroids {
                k: 2,
                dim: 1,
                values: vec![0.5],
            },
        }))
        .unwrap();
        runtime.block_on(async {
            coordinator_side
                .write_all(&(body.len() as u32).to_le_bytes())
                .await
                .unwrap();
            coordinator_side.write_all(&body).await.unwrap();
            coordinator_side.flush().await.unwrap();
        });

        let mut node = TcpWorkerGroup::member(runtime.clone(), node_side, 1, 2, None);
        let err = node.broadcast(Phase::Seed, None).unwrap_err();
        match err.downcast_ref::<ClusterError>() {
            Some(ClusterError::Protocol { rank, .. }) => assert_eq!(*rank, COORDINATOR_RANK),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_phase_mismatch_is_protocol_error() {
        let (mut coordinator, mut nodes) = connect(1, None);
        let mut node = nodes.pop().unwrap();

        node.reduce_sum(Phase::Round(4), &accumulator_with(0, 0.1)).unwrap();
        let err = coordinator
            .reduce_sum(Phase::Round(3), &accumulator_with(0, 0.1))
            .unwrap_err();
        assert!(err.to_string().contains("protocol error"));
    }
}
