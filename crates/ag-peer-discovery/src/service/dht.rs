use std::net::SocketAddr;

use crate::domain::{DhtRequest, DhtResponse};
use crate::ports::PeerDirectory;
use crate::service::DhtService;

impl DhtService {
    /// Apply a request to the table and build the reply.
    pub(crate) fn answer(&mut self, request: DhtRequest, sender_addr: SocketAddr) -> DhtResponse {
        let local_id = *self.local_node_id();

        match request {
            DhtRequest::Ping { sender_id } => {
                self.observe_peer(sender_id, sender_addr);
                DhtResponse::Pong {
                    sender_id: local_id,
                }
            }
            DhtRequest::FindNode {
                sender_id,
                target_id,
            } => {
                self.observe_peer(sender_id, sender_addr);
                let k = self.routing_table.config().k;
                DhtResponse::Nodes {
                    sender_id: local_id,
                    nodes: self.routing_table.find_closest_peers(&target_id, k),
                }
            }
            DhtRequest::Unknown { command } => DhtResponse::unknown_command(&command),
        }
    }
}
