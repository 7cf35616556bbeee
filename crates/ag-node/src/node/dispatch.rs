//! Inbound frame handling.
//!
//! | Record | Action |
//! |--------|--------|
//! | `HANDSHAKE` | verify, record peer, establish session, maybe reply, emit `PeerConnected` |
//! | `MESSAGE` | decrypt, emit `MessageReceived` |
//! | `PING` / `FIND_NODE` | answer from the routing table |
//! | unknown type with `senderId` | answer `ERROR` |
//! | `PONG` / `NODES` / `ERROR` | resolve the matching outstanding request |
//! | anything else | log, emit `Error`, ignore |

use super::actor::{NodeActor, PendingRequest};
use super::DhtReply;
use crate::config::HandshakeMode;
use crate::envelope::{
    decode_frame, Envelope, HandshakeRecord, Inbound, MessageRecord, NodesRecord, WirePeer,
};
use crate::error::{HandshakeError, NodeError};
use crate::events::NodeEvent;
use crate::handshake::verify_handshake;
use crate::transport::ConnectionId;
use ag_crypto::{EncryptedPayload, StaticKeyCipher};
use ag_peer_discovery::{DhtRequest, PeerDirectory};
use tracing::{debug, info, warn};

impl NodeActor {
    pub(super) fn on_frame(&mut self, conn_id: ConnectionId, frame: &[u8]) {
        if !self.connections.contains_key(&conn_id) {
            return;
        }

        match decode_frame(frame) {
            Ok(Inbound::Known(envelope)) => {
                debug!(conn = %conn_id, kind = envelope.kind(), "Frame received");
                self.dispatch(conn_id, envelope);
            }
            Ok(Inbound::UnknownDhtCommand { command, rpc_id }) => {
                warn!(conn = %conn_id, %command, "Unknown DHT command");
                self.answer(conn_id, DhtRequest::Unknown { command }, rpc_id);
            }
            Ok(Inbound::UnknownType(kind)) => {
                warn!(conn = %conn_id, %kind, "Ignoring unknown message type");
                self.report(NodeError::UnknownMessageType(kind));
            }
            Err(e) => {
                warn!(conn = %conn_id, error = %e, "Dropping unparseable frame");
                self.report(e);
            }
        }
    }

    fn dispatch(&mut self, conn_id: ConnectionId, envelope: Envelope) {
        if let Some((request, rpc_id)) = envelope.as_dht_request() {
            self.answer(conn_id, request, rpc_id);
            return;
        }

        match envelope {
            Envelope::Handshake(record) => self.on_handshake(conn_id, &record),
            Envelope::Message(record) => self.on_message(conn_id, &record),
            Envelope::Pong(record) => {
                if let Some(pending) = self.take_pending(conn_id, record.rpc_id, "PONG") {
                    let _ = pending.reply.send(Ok(DhtReply::Pong(record.sender_id)));
                }
            }
            Envelope::Nodes(record) => self.on_nodes(conn_id, record),
            Envelope::Error(record) => {
                if let Some(pending) = self.take_pending(conn_id, record.rpc_id, "ERROR") {
                    let _ = pending
                        .reply
                        .send(Err(NodeError::UnknownDhtCommand(record.message)));
                } else {
                    warn!(conn = %conn_id, message = %record.message, "Remote reported an error");
                }
            }
            Envelope::Ping(_) | Envelope::FindNode(_) => {}
        }
    }

    fn on_handshake(&mut self, conn_id: ConnectionId, record: &HandshakeRecord) {
        let verified = match verify_handshake(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(conn = %conn_id, error = %e, "Rejecting handshake");
                self.report(e.into());
                return;
            }
        };
        let peer_id = verified.peer_id;
        if peer_id == self.identity.node_id() {
            warn!(conn = %conn_id, "Ignoring handshake from ourselves");
            return;
        }

        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return;
        };
        if let Some(bound) = conn.peer_id.filter(|bound| *bound != peer_id) {
            warn!(conn = %conn_id, %bound, claimed = %peer_id, "Connection changed identity, closing");
            self.report(HandshakeError::IdentityChanged {
                bound,
                claimed: peer_id,
            }
            .into());
            self.close_connection(conn_id, Some("handshake identity changed".into()));
            return;
        }
        conn.peer_id = Some(peer_id);
        if let Some(port) = verified.listen_port {
            conn.advertised = Some(std::net::SocketAddr::new(conn.handle.remote.ip(), port));
        }
        let address = conn.peer_address();
        let reply_needed =
            self.config.session.handshake_mode == HandshakeMode::Mutual && !conn.handshake_sent;

        let outcome = self.dht.observe_peer(peer_id, address);
        debug!(peer = %peer_id, %address, ?outcome, "Routing table updated");

        let secret = self.identity.agreement().agree(&verified.agreement_key);
        let replaced = self.sessions.establish(
            peer_id,
            Box::new(StaticKeyCipher::from_shared_secret(&secret)),
            self.dht.now(),
        );
        if let Some(previous) = self.active_peers.insert(peer_id, conn_id) {
            if previous != conn_id {
                debug!(peer = %peer_id, old = %previous, new = %conn_id, "Peer moved to a new connection");
            }
        }

        if reply_needed {
            self.send_handshake(conn_id);
            if !self.connections.contains_key(&conn_id) {
                return;
            }
        }

        info!(peer = %peer_id, conn = %conn_id, rekeyed = replaced, "Secure session established");
        self.events.publish(NodeEvent::PeerConnected { id: peer_id });
    }

    fn on_message(&mut self, conn_id: ConnectionId, record: &MessageRecord) {
        let from_id = record.from_id;
        let bound = self.connections.get(&conn_id).and_then(|c| c.peer_id);
        if bound.is_some_and(|peer| peer != from_id) {
            warn!(conn = %conn_id, claimed = %from_id, "MESSAGE sender does not match connection");
            self.report(NodeError::AuthenticationFailure(from_id));
            return;
        }

        let payload = match EncryptedPayload::try_from(&record.payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(conn = %conn_id, error = %e, "Malformed MESSAGE payload");
                self.report(NodeError::FrameParse(format!("MESSAGE payload: {e}")));
                return;
            }
        };

        let plaintext = match self.sessions.decrypt(&from_id, &payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(peer = %from_id, error = %e, "Dropping MESSAGE");
                self.report(e);
                return;
            }
        };

        match String::from_utf8(plaintext) {
            Ok(content) => {
                debug!(peer = %from_id, len = content.len(), "Message received");
                self.events.publish(NodeEvent::MessageReceived {
                    from_id,
                    content,
                    timestamp: record.timestamp,
                });
            }
            Err(_) => {
                warn!(peer = %from_id, "MESSAGE content is not valid UTF-8");
                self.report(NodeError::FrameParse("MESSAGE content is not valid UTF-8".into()));
            }
        }
    }

    fn on_nodes(&mut self, conn_id: ConnectionId, record: NodesRecord) {
        let Some(pending) = self.take_pending(conn_id, record.rpc_id, "NODES") else {
            return;
        };

        let local = self.identity.node_id();
        let peers: Vec<_> = record.nodes.iter().filter_map(WirePeer::to_record).collect();
        if peers.len() < record.nodes.len() {
            debug!(
                conn = %conn_id,
                skipped = record.nodes.len() - peers.len(),
                "Skipping NODES entries with bad addresses"
            );
        }
        for peer in peers.iter().filter(|p| p.node_id != local) {
            self.dht.add_peer(peer.clone());
        }

        let _ = pending.reply.send(Ok(DhtReply::Nodes {
            sender_id: record.sender_id,
            peers,
        }));
    }

    fn answer(&mut self, conn_id: ConnectionId, request: DhtRequest, rpc_id: Option<u64>) {
        let Some(sender_addr) = self.connections.get(&conn_id).map(|c| c.peer_address()) else {
            return;
        };
        let response = self.dht.handle_request(request, sender_addr);
        let envelope = Envelope::from_dht_response(response, rpc_id);
        if let Err(e) = self.send_envelope(conn_id, &envelope) {
            warn!(conn = %conn_id, error = %e, "Failed to answer DHT request");
        }
    }

    fn take_pending(
        &mut self,
        conn_id: ConnectionId,
        rpc_id: Option<u64>,
        kind: &str,
    ) -> Option<PendingRequest> {
        let solicited = rpc_id.filter(|id| {
            self.pending
                .get(id)
                .is_some_and(|pending| pending.conn == conn_id)
        });
        match solicited {
            Some(id) => self.pending.remove(&id),
            None => {
                debug!(conn = %conn_id, ?rpc_id, kind, "Ignoring unsolicited response");
                None
            }
        }
    }
}
