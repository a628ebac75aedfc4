//! In-process worker group
//!
//! Runs each worker on its own thread and connects them with crossbeam
//! channels. Workers still share no mutable state: accumulators and centroid
//! sets are moved through the channels by value.

use super::{Phase, WorkerGroup, COORDINATOR_RANK};
use crate::cluster::{CentroidSet, ClusterAccumulator};
use crate::error::ClusterError;
use crate::Result;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Accumulator sent from a member to the coordinator
#[derive(Debug)]
struct Contribution {
    phase: Phase,
    accumulator: ClusterAccumulator,
}

/// Centroids sent from the coordinator to a member
#[derive(Debug)]
struct Update {
    phase: Phase,
    centroids: CentroidSet,
}

enum Role {
    Coordinator {
        /// One receiver per member, indexed by `rank - 1`
        contributions: Vec<Receiver<Contribution>>,
        /// One sender per member, indexed by `rank - 1`
        updates: Vec<Sender<Update>>,
    },
    Member {
        contribute: Sender<Contribution>,
        updates: Receiver<Update>,
    },
}

/// Channel-backed [`WorkerGroup`] member
pub struct LocalGroup {
    rank: usize,
    size: usize,
    timeout: Option<Duration>,
    role: Role,
}

impl LocalGroup {
    /// Create a connected group of `size` members, ordered by rank
    ///
    /// Move each member onto its own thread.
    pub fn create(size: usize, timeout: Option<Duration>) -> Result<Vec<LocalGroup>> {
        if size == 0 {
            anyhow::bail!("worker group needs at least one worker");
        }

        let mut coordinator_contributions = Vec::with_capacity(size - 1);
        let mut coordinator_updates = Vec::with_capacity(size - 1);
        let mut members = Vec::with_capacity(size - 1);

        for rank in 1..size {
            let (contribute_tx, contribute_rx) = unbounded();
            let (update_tx, update_rx) = unbounded();
            coordinator_contributions.push(contribute_rx);
            coordinator_updates.push(update_tx);
            members.push(LocalGroup {
                rank,
                size,
                timeout,
                role: Role::Member {
                    contribute: contribute_tx,
                    updates: update_rx,
                },
            });
        }

        let mut group = Vec::with_capacity(size);
        group.push(LocalGroup {
            rank: COORDINATOR_RANK,
            size,
            timeout,
            role: Role::Coordinator {
                contributions: coordinator_contributions,
                updates: coordinator_updates,
            },
        });
        group.extend(members);
        Ok(group)
    }
}

/// Receive with the group's optional timeout
fn recv<T>(
    rx: &Receiver<T>,
    timeout: Option<Duration>,
    collective: &'static str,
    peer: usize,
) -> std::result::Result<T, ClusterError> {
    match timeout {
        Some(limit) => rx.recv_timeout(limit).map_err(|e| match e {
            RecvTimeoutError::Timeout => ClusterError::CollectiveTimeout {
                collective,
                rank: peer,
                waited: limit,
            },
            RecvTimeoutError::Disconnected => ClusterError::PeerDisconnected { collective, rank: peer },
        }),
        None => rx
            .recv()
            .map_err(|_| ClusterError::PeerDisconnected { collective, rank: peer }),
    }
}

impl WorkerGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn reduce_sum(&mut self, phase: Phase, local: &ClusterAccumulator) -> Result<Option<ClusterAccumulator>> {
        match &self.role {
            Role::Coordinator { contributions, .. } => {
                let mut global = local.clone();
                for (index, rx) in contributions.iter().enumerate() {
                    let peer = index + 1;
                    let contribution = recv(rx, self.timeout, "reduce", peer)?;
                    if contribution.phase != phase {
                        return Err(ClusterError::Protocol {
                            rank: peer,
                            detail: format!("expected {} contribution, got {}", phase, contribution.phase),
                        }
                        .into());
                    }
                    global.merge(&contribution.accumulator)?;
                }
                Ok(Some(global))
            }
            Role::Member { contribute, .. } => {
                contribute
                    .send(Contribution {
                        phase,
                        accumulator: local.clone(),
                    })
                    .map_err(|_| ClusterError::PeerDisconnected {
                        collective: "reduce",
                        rank: COORDINATOR_RANK,
                    })?;
                Ok(None)
            }
        }
    }

    fn broadcast(&mut self, phase: Phase, centroids: Option<&CentroidSet>) -> Result<CentroidSet> {
        match &self.role {
            Role::Coordinator { updates, .. } => {
                let centroids = centroids
                    .ok_or_else(|| anyhow::anyhow!("coordinator must supply centroids to broadcast"))?;
                for (index, tx) in updates.iter().enumerate() {
                    tx.send(Update {
                        phase,
                        centroids: centroids.clone(),
                    })
                    .map_err(|_| ClusterError::PeerDisconnected {
                        collective: "broadcast",
                        rank: index + 1,
                    })?;
                }
                Ok(centroids.clone())
            }
            Role::Member { updates, .. } => {
                let update = recv(updates, self.timeout, "broadcast", COORDINATOR_RANK)?;
                if update.phase != phase {
                    return Err(ClusterError::Protocol {
                        rank: COORDINATOR_RANK,
                        detail: format!("expected {} centroids, got {}", phase, update.phase),
                    }
                    .into());
                }
                Ok(update.centroids)
            }
        }
    }
}
