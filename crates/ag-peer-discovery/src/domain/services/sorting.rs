//! Peer sorting and selection.

use super::distance::xor_distance;
use crate::domain::{NodeId, PeerRecord};

/// Sort peers by XOR distance from a target node (closest first).
///
/// The sort is stable, so peers at equal distance keep their input order.
pub fn sort_peers_by_distance(peers: &[PeerRecord], target: &NodeId) -> Vec<PeerRecord> {
    let mut keyed: Vec<_> = peers
        .iter()
        .map(|p| (xor_distance(&p.node_id, target), p))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, p)| p.clone()).collect()
}

/// Find the k closest peers to a target from a list
///
/// # Returns
/// Up to k peers sorted by ascending distance (closest first)
pub fn find_k_closest(peers: &[PeerRecord], target: &NodeId, k: usize) -> Vec<PeerRecord> {
    let mut sorted = sort_peers_by_distance(peers, target);
    sorted.truncate(k);
    sorted
}
