//! Distributed mode protocol
//!
//! This module defines the messages exchanged between the coordinator (rank 0)
//! and node services (ranks 1..n). The protocol uses MessagePack (rmp-serde)
//! for compact binary serialization with full serde feature support.
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator (rank 0)              Node (rank r)
//!     |                                  |
//!     |-------- CONFIG(rank, size) ----->|   generate shard r
//!     |<------- READY(points) -----------|
//!     |                                  |
//!     |-------- CENTROIDS(seed) -------->|
//!     |                                  |
//!     |  repeat for round 0..max_rounds: |
//!     |<------- ACCUMULATOR(round) ------|   reduce_sum
//!     |-------- CENTROIDS(round) ------->|   broadcast
//!     |                                  |
//!     |-------- FINISH ----------------->|
//! ```
//!
//! A node that fails sends ERROR instead of its next expected message.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::cluster::{CentroidSet, ClusterAccumulator};
use crate::comm::Phase;
use crate::config::Config;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Coordinator and nodes must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame accepted from a peer
pub const MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Configuration message (Coordinator → Node)
    ///
    /// Assigns the node its rank and carries the complete run configuration.
    Config(ConfigMessage),

    /// Ready message (Node → Coordinator)
    ///
    /// Sent once the node has built its shard.
    Ready(ReadyMessage),

    /// Reduce contribution (Node → Coordinator)
    Accumulator(AccumulatorMessage),

    /// Broadcast of the current centroids (Coordinator → Node)
    Centroids(CentroidsMessage),

    /// Run complete (Coordinator → Node)
    Finish,

    /// Error message (either direction)
    ///
    /// The receiver aborts the run and reports the error.
    Error(ErrorMessage),
}

/// Configuration message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMessage {
    /// Protocol version (must match)
    pub protocol_version: u32,

    /// Rank assigned to the receiving node
    pub rank: usize,

    /// Total workers including the coordinator
    pub world_size: usize,

    /// Complete run configuration
    pub config: Config,
}

/// Ready message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyMessage {
    /// Protocol version
    pub protocol_version: u32,

    /// Node identifier (hostname)
    pub node_id: String,

    /// Rank the node accepted
    pub rank: usize,

    /// Points in the node's shard
    pub shard_points: usize,
}

/// A node's local sums and counts for one phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorMessage {
    pub rank: usize,
    pub phase: Phase,
    pub accumulator: ClusterAccumulator,
}

/// Centroids broadcast by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidsMessage {
    pub phase: Phase,
    pub centroids: CentroidSet,
}

/// Error message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Node identifier
    pub node_id: String,

    /// Rank of the sender
    pub rank: usize,

    /// Error description
    pub error: String,
}

/// Serialize a message to bytes
///
/// Prepends a 4-byte little-endian length field for framing.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg).context("Failed to serialize message")?;

    let msg_len = u32::try_from(msg_bytes.len()).context("Message too large for u32 length prefix")?;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Read a complete message from a stream
///
/// Reads the length prefix, then the message body.
pub async fn read_message<R>(stream: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;

    if msg_len > MAX_MESSAGE_BYTES {
        anyhow::bail!("Message too large: {} bytes (max {} bytes)", msg_len, MAX_MESSAGE_BYTES);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream
        .read_exact(&mut msg_buf)
        .await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf).context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write a message to a stream
///
/// Serializes the message with its length prefix, writes it, and flushes.
pub async fn write_message<W>(stream: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;

    stream.write_all(&framed).await.context("Failed to write message")?;

    stream.flush().await.context("Failed to flush stream")?;

    Ok(())
}

/// Short name of a message variant for diagnostics
pub fn message_kind(msg: &Message) -> &'static str {
    match msg {
        Message::Config(_) => "CONFIG",
        Message::Ready(_) => "READY",
        Message::Accumulator(_) => "ACCUMULATOR",
        Message::Centroids(_) => "CENTROIDS",
        Message::Finish => "FINISH",
        Message::Error(_) => "ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Read one framed message from `bytes`, returning it with the unread byte count
    fn decode(bytes: &[u8]) -> Result<(Message, usize)> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let mut reader = bytes;
        let msg = runtime.block_on(read_message(&mut reader))?;
        Ok((msg, reader.len()))
    }

    #[test]
    fn test_serialize_deserialize_ready() {
        let msg = Message::Ready(ReadyMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: "node-a".to_string(),
            rank: 2,
            shard_points: 250_000,
        });

        let bytes = serialize_message(&msg).unwrap();
        let (deserialized, unread) = decode(&bytes).unwrap();

        assert_eq!(unread, 0);

        match deserialized {
            Message::Ready(ready) => {
                assert_eq!(ready.protocol_version, PROTOCOL_VERSION);
                assert_eq!(ready.node_id, "node-a");
                assert_eq!(ready.rank, 2);
                assert_eq!(ready.shard_points, 250_000);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_accumulator_preserves_bits() {
        let mut accumulator = ClusterAccumulator::new(2, 2).unwrap();
        accumulator.add_point(1, &[0.1, 0.7]);
        accumulator.add_point(1, &[1.0 / 3.0, 0.2]);

        let msg = Message::Accumulator(AccumulatorMessage {
            rank: 3,
            phase: Phase::Round(7),
            accumulator: accumulator.clone(),
        });

        let bytes = serialize_message(&msg).unwrap();
        let (deserialized, _) = decode(&bytes).unwrap();

        match deserialized {
            Message::Accumulator(m) => {
                assert_eq!(m.rank, 3);
                assert_eq!(m.phase, Phase::Round(7));
                assert_eq!(m.accumulator, accumulator);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_serialize_deserialize_finish() {
        let bytes = serialize_message(&Message::Finish).unwrap();
        let (deserialized, unread) = decode(&bytes).unwrap();

        assert_eq!(unread, 0);
        assert!(matches!(deserialized, Message::Finish));
    }

    #[test]
    fn test_message_framing() {
        let bytes = serialize_message(&Message::Finish).unwrap();

        assert!(bytes.len() >= 4);
        let msg_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + msg_len);
    }

    #[test]
    fn test_read_incomplete_frame() {
        let bytes = serialize_message(&Message::Finish).unwrap();
        assert!(decode(&bytes[..2]).is_err());
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_read_leaves_following_frame() {
        let mut bytes = serialize_message(&Message::Finish).unwrap();
        let first_len = bytes.len();
        bytes.extend(serialize_message(&Message::Finish).unwrap());

        let (_, unread) = decode(&bytes).unwrap();
        assert_eq!(unread, bytes.len() - first_len);
    }

    #[test]
    fn test_read_write_over_duplex() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (mut a, mut b) = tokio::io::duplex(1024);
            let centroids = CentroidSet::from_values(2, 1, vec![0.25, 0.75]).unwrap();

            write_message(
                &mut a,
                &Message::Centroids(CentroidsMessage {
                    phase: Phase::Seed,
                    centroids: centroids.clone(),
                }),
            )
            .await
            .unwrap();

            match read_message(&mut b).await.unwrap() {
                Message::Centroids(m) => {
                    assert_eq!(m.phase, Phase::Seed);
                    assert_eq!(m.centroids, centroids);
                }
                other => panic!("Wrong message type: {}", message_kind(&other)),
            }
        });
    }

    #[test]
    fn test_read_rejects_oversized_frame() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let (mut a, mut b) = tokio::io::duplex(64);
            let len = (MAX_MESSAGE_BYTES as u32 + 1).to_le_bytes();
            a.write_all(&len).await.unwrap();

            let err = read_message(&mut b).await.unwrap_err();
            assert!(err.to_string().contains("too large"));
        });
    }

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
