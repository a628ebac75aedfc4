//! Distributed mode implementation
//!
//! This module runs one worker per process across multiple nodes.
//!
//! # Architecture
//!
//! Distributed mode uses a coordinator-node architecture:
//!
//! - **Coordinator**: Rank 0. Connects to all nodes, assigns ranks, and
//!   performs the reduce and broadcast of every round
//! - **Node Service**: Long-running process on each node; serves one run per
//!   coordinator connection
//!
//! # Modules
//!
//! - `protocol`: Message definitions and serialization
//! - `node_service`: Node service implementation
//! - `coordinator`: Distributed coordinator implementation

pub mod coordinator;
pub mod node_service;
pub mod protocol;

// Re-export key types
pub use protocol::{
    AccumulatorMessage, CentroidsMessage, ConfigMessage, ErrorMessage, Message, ReadyMessage, PROTOCOL_VERSION,
};

pub use coordinator::DistributedCoordinator;
pub use node_service::NodeService;
