//! DHT request/response vocabulary.
//!
//! These are the decoded forms of the PING, FIND_NODE, PONG, NODES and ERROR
//! records. Wire encoding is the caller's concern.

use super::{NodeId, PeerRecord};

/// An inbound DHT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhtRequest {
    /// Liveness check.
    Ping {
        /// Requesting node.
        sender_id: NodeId,
    },
    /// Ask for the peers closest to `target_id`.
    FindNode {
        /// Requesting node.
        sender_id: NodeId,
        /// Id being looked up.
        target_id: NodeId,
    },
    /// A request type this node does not implement.
    Unknown {
        /// The unrecognised command name.
        command: String,
    },
}

impl DhtRequest {
    /// Requesting node, when the request names one.
    pub fn sender_id(&self) -> Option<&NodeId> {
        match self {
            Self::Ping { sender_id } | Self::FindNode { sender_id, .. } => Some(sender_id),
            Self::Unknown { .. } => None,
        }
    }
}

/// The reply to a [`DhtRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhtResponse {
    /// Reply to PING.
    Pong {
        /// Responding node.
        sender_id: NodeId,
    },
    /// Reply to FIND_NODE, closest first.
    Nodes {
        /// Responding node.
        sender_id: NodeId,
        /// Up to k peers ordered by ascending distance to the target.
        nodes: Vec<PeerRecord>,
    },
    /// Reply to an unknown command.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl DhtResponse {
    /// Build the reply for an unrecognised command.
    pub fn unknown_command(command: &str) -> Self {
        Self::Error {
            message: format!("Unknown DHT command: {command}"),
        }
    }
}
