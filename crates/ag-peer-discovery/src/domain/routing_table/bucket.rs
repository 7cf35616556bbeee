//! K-Bucket implementation for Kademlia routing.

use crate::domain::{NodeId, PeerRecord, Timestamp};

/// A k-bucket storing up to k peers.
///
/// Peers are kept in recency order: the front is the least recently seen,
/// the back is the most recently seen.
#[derive(Debug, Clone)]
pub struct KBucket {
    /// Peers in this bucket (max size = K, default 20)
    pub(crate) peers: Vec<PeerRecord>,
    /// Last time this bucket was updated
    pub(crate) last_updated: Timestamp,
}

impl KBucket {
    /// Create a new empty k-bucket
    pub fn new() -> Self {
        Self {
            peers: Vec::new(),
            last_updated: Timestamp::new(0),
        }
    }

    /// Get the number of peers in this bucket
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Check if the bucket is full
    pub fn is_full(&self, k: usize) -> bool {
        self.peers.len() >= k
    }

    /// Get the oldest peer (least recently seen)
    pub fn oldest_peer(&self) -> Option<&PeerRecord> {
        self.peers.first()
    }

    /// Get all peers, least recently seen first
    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    /// When the bucket last changed
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Append a peer at the most recently seen position (assumes not full)
    pub(crate) fn push_recent(&mut self, peer: PeerRecord) {
        self.last_updated = self.last_updated.max(peer.last_seen);
        self.peers.push(peer);
    }

    /// Drop and return the least recently seen peer.
    pub(crate) fn evict_oldest(&mut self) -> Option<PeerRecord> {
        if self.peers.is_empty() {
            None
        } else {
            Some(self.peers.remove(0))
        }
    }

    /// Remove a peer by NodeId.
    pub(crate) fn remove_peer(&mut self, node_id: &NodeId) -> Option<PeerRecord> {
        self.peers
            .iter()
            .position(|p| &p.node_id == node_id)
            .map(|pos| self.peers.remove(pos))
    }

    /// Look up a peer by NodeId.
    pub(crate) fn get(&self, node_id: &NodeId) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| &p.node_id == node_id)
    }

    /// Check if bucket contains a peer
    pub(crate) fn contains(&self, node_id: &NodeId) -> bool {
        self.get(node_id).is_some()
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
