//! Domain Errors for Peer Discovery

use std::fmt;

/// Errors that can occur during peer discovery operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerDiscoveryError {
    /// Peer not found in routing table
    PeerNotFound,
    /// Table capacity `k` was zero
    ZeroCapacity,
}

impl fmt::Display for PeerDiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerNotFound => write!(f, "Peer not found in routing table"),
            Self::ZeroCapacity => write!(f, "Routing table capacity k must be at least 1"),
        }
    }
}

impl std::error::Error for PeerDiscoveryError {}
