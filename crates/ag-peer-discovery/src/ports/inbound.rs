//! # Driving Ports (Inbound API)
//!
//! The peer directory as the node sees it.

use crate::domain::{
    AddPeerOutcome, DhtRequest, DhtResponse, NodeId, PeerDiscoveryError, PeerRecord,
    RoutingTableStats,
};
use std::net::SocketAddr;

/// Primary API for interacting with the peer directory.
///
/// # Example
///
/// ```rust,ignore
/// use ag_peer_discovery::ports::PeerDirectory;
///
/// fn discover_peers<T: PeerDirectory>(api: &T, target: NodeId) {
///     let closest = api.find_closest_peers(target, 20);
///     println!("Found {} peers", closest.len());
/// }
/// ```
pub trait PeerDirectory {
    /// Find the closest known peers to a target ID, closest first.
    fn find_closest_peers(&self, target_id: NodeId, count: usize) -> Vec<PeerRecord>;

    /// Record that `node_id` was seen at `address` just now.
    ///
    /// Upserts with recency-based eviction; a no-op for the local id.
    fn observe_peer(&mut self, node_id: NodeId, address: SocketAddr) -> AddPeerOutcome;

    /// Insert a record learned from a third party, keeping its `last_seen`.
    fn add_peer(&mut self, peer: PeerRecord) -> AddPeerOutcome;

    /// Look up a peer by id.
    fn get_peer(&self, node_id: NodeId) -> Option<PeerRecord>;

    /// Remove a peer from the table.
    ///
    /// # Errors
    ///
    /// `PeerNotFound` if the peer is not in the table.
    fn remove_peer(&mut self, node_id: NodeId) -> Result<PeerRecord, PeerDiscoveryError>;

    /// Answer an inbound DHT request received from `sender_addr`.
    fn handle_request(&mut self, request: DhtRequest, sender_addr: SocketAddr) -> DhtResponse;

    /// Get routing table statistics.
    fn get_stats(&self) -> RoutingTableStats;
}
