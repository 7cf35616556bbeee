//! Main RoutingTable implementation.

use crate::domain::{
    find_k_closest, KademliaConfig, NodeId, PeerDiscoveryError, PeerRecord, Timestamp,
};

use super::bucket::KBucket;
use super::stats::{AddPeerOutcome, RoutingTableStats};

/// Flat Kademlia routing table.
///
/// # Invariants
/// - size ≤ k
/// - the local node id is never a member
/// - entries are unique by node id and ordered by recency (most recent last)
#[derive(Debug, Clone)]
pub struct RoutingTable {
    /// Our own node ID (immutable after creation)
    local_node_id: NodeId,
    /// Single bounded bucket
    bucket: KBucket,
    /// Configuration including k
    config: KademliaConfig,
}

impl RoutingTable {
    /// Create a new routing table.
    ///
    /// # Errors
    ///
    /// `ZeroCapacity` if `config.k` is 0.
    pub fn new(local_node_id: NodeId, config: KademliaConfig) -> Result<Self, PeerDiscoveryError> {
        if config.k == 0 {
            return Err(PeerDiscoveryError::ZeroCapacity);
        }
        Ok(Self {
            local_node_id,
            bucket: KBucket::new(),
            config,
        })
    }

    /// Get our local node ID
    pub fn local_node_id(&self) -> &NodeId {
        &self.local_node_id
    }

    /// Get the configuration
    pub fn config(&self) -> &KademliaConfig {
        &self.config
    }

    /// Number of peers stored
    pub fn len(&self) -> usize {
        self.bucket.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.bucket.is_empty()
    }

    /// All peers, least recently seen first
    pub fn peers(&self) -> &[PeerRecord] {
        self.bucket.peers()
    }

    /// Upsert a peer with recency-based eviction.
    ///
    /// - own id: ignored
    /// - known id: record replaced and moved to the most recent position
    /// - new id, table full: least recently seen peer evicted, new one appended
    /// - new id, room left: appended
    pub fn add_peer(&mut self, peer: PeerRecord) -> AddPeerOutcome {
        if peer.node_id == self.local_node_id {
            return AddPeerOutcome::IgnoredSelf;
        }

        if self.bucket.remove_peer(&peer.node_id).is_some() {
            self.bucket.push_recent(peer);
            return AddPeerOutcome::Updated;
        }

        if self.bucket.is_full(self.config.k) {
            if let Some(old) = self.bucket.evict_oldest() {
                self.bucket.push_recent(peer);
                return AddPeerOutcome::Evicted(old);
            }
        }

        self.bucket.push_recent(peer);
        AddPeerOutcome::Inserted
    }

    /// Up to `count` peers ordered by ascending XOR distance to `target`.
    pub fn find_closest_peers(&self, target: &NodeId, count: usize) -> Vec<PeerRecord> {
        find_k_closest(self.bucket.peers(), target, count)
    }

    /// Look up a peer by id.
    pub fn get_peer(&self, node_id: &NodeId) -> Option<&PeerRecord> {
        self.bucket.get(node_id)
    }

    /// Check if a peer is in the table.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.bucket.contains(node_id)
    }

    /// Remove a peer by id.
    pub fn remove_peer(&mut self, node_id: &NodeId) -> Result<PeerRecord, PeerDiscoveryError> {
        self.bucket
            .remove_peer(node_id)
            .ok_or(PeerDiscoveryError::PeerNotFound)
    }

    /// Get routing table statistics
    pub fn stats(&self, now: Timestamp) -> RoutingTableStats {
        let oldest_peer_age_ms = self
            .bucket
            .oldest_peer()
            .map(|p| now.as_millis().saturating_sub(p.last_seen.as_millis()))
            .unwrap_or(0);

        RoutingTableStats {
            total_peers: self.bucket.len(),
            capacity: self.config.k,
            oldest_peer_age_ms,
        }
    }
}
