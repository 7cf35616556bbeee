use std::net::SocketAddr;

use crate::domain::{
    AddPeerOutcome, DhtRequest, DhtResponse, NodeId, PeerDiscoveryError, PeerRecord,
    RoutingTableStats,
};
use crate::ports::PeerDirectory;
use crate::service::DhtService;

impl PeerDirectory for DhtService {
    fn find_closest_peers(&self, target_id: NodeId, count: usize) -> Vec<PeerRecord> {
        self.routing_table.find_closest_peers(&target_id, count)
    }

    fn observe_peer(&mut self, node_id: NodeId, address: SocketAddr) -> AddPeerOutcome {
        let now = self.now();
        self.routing_table
            .add_peer(PeerRecord::new(node_id, address, now))
    }

    fn add_peer(&mut self, peer: PeerRecord) -> AddPeerOutcome {
        self.routing_table.add_peer(peer)
    }

    fn get_peer(&self, node_id: NodeId) -> Option<PeerRecord> {
        self.routing_table.get_peer(&node_id).cloned()
    }

    fn remove_peer(&mut self, node_id: NodeId) -> Result<PeerRecord, PeerDiscoveryError> {
        self.routing_table.remove_peer(&node_id)
    }

    fn handle_request(&mut self, request: DhtRequest, sender_addr: SocketAddr) -> DhtResponse {
        self.answer(request, sender_addr)
    }

    fn get_stats(&self) -> RoutingTableStats {
        let now = self.now();
        self.routing_table.stats(now)
    }
}
