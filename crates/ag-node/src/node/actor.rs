//! The node event loop.
//!
//! Owns every piece of mutable node state. Commands from [`super::Node`]
//! handles and events from transport tasks are processed one at a time, so
//! frames on a connection are handled in arrival order.

use super::{Command, DhtCall, DhtReply, LocalAddrs, Route};
use crate::config::NodeConfig;
use crate::envelope::{Envelope, FindNodeRecord, MessageRecord, PingRecord};
use crate::error::NodeError;
use crate::events::{EventBus, NodeEvent};
use crate::framing::encode_frame;
use crate::handshake::LocalIdentity;
use crate::session::SessionStore;
use crate::transport::{
    self, ConnectionHandle, ConnectionId, ConnectionLimits, Direction, TransportEvent,
    TransportSender,
};
use ag_peer_discovery::{DhtService, NodeId, PeerDirectory, SystemTimeSource};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// An open connection. Dials in flight live in `NodeActor::dialing`.
#[derive(Debug)]
pub(super) struct Connection {
    pub(super) handle: ConnectionHandle,
    /// Set by the first HANDSHAKE that verifies; never changes afterwards.
    pub(super) peer_id: Option<NodeId>,
    /// Remote listen address from its HANDSHAKE.
    pub(super) advertised: Option<SocketAddr>,
    pub(super) handshake_sent: bool,
}

impl Connection {
    /// Address to record for the remote in the routing table.
    pub(super) fn peer_address(&self) -> SocketAddr {
        self.advertised.unwrap_or(self.handle.remote)
    }
}

#[derive(Debug)]
pub(super) struct PendingRequest {
    pub(super) conn: ConnectionId,
    pub(super) reply: oneshot::Sender<Result<DhtReply, NodeError>>,
}

#[derive(Debug)]
struct DatagramSocket {
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct Listener {
    local: SocketAddr,
    task: JoinHandle<()>,
}

pub(super) struct NodeActor {
    pub(super) identity: LocalIdentity,
    pub(super) config: NodeConfig,
    pub(super) dht: DhtService,
    pub(super) sessions: SessionStore,
    pub(super) connections: HashMap<ConnectionId, Connection>,
    pub(super) active_peers: HashMap<NodeId, ConnectionId>,
    pub(super) pending: HashMap<u64, PendingRequest>,
    pub(super) events: Arc<EventBus>,
    dialing: HashMap<ConnectionId, oneshot::Sender<Result<ConnectionId, NodeError>>>,
    listener: Option<Listener>,
    datagram: Option<DatagramSocket>,
    transport_tx: TransportSender,
    next_conn: u64,
    next_rpc: u64,
    next_generation: u64,
}

impl NodeActor {
    pub(super) fn new(
        config: NodeConfig,
        identity: LocalIdentity,
        events: Arc<EventBus>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), NodeError> {
        let dht = DhtService::new(
            identity.node_id(),
            config.kademlia_config(),
            Box::new(SystemTimeSource::new()),
        )
        .map_err(|e| NodeError::Config(e.to_string()))?;
        let (transport_tx, transport_rx) =
            mpsc::channel(config.transport.event_channel_capacity);

        let actor = Self {
            identity,
            config,
            dht,
            sessions: SessionStore::new(),
            connections: HashMap::new(),
            active_peers: HashMap::new(),
            pending: HashMap::new(),
            events,
            dialing: HashMap::new(),
            listener: None,
            datagram: None,
            transport_tx,
            next_conn: 0,
            next_rpc: 0,
            next_generation: 0,
        };
        Ok((actor, transport_rx))
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut transport: mpsc::Receiver<TransportEvent>,
    ) {
        debug!(node_id = %self.identity.node_id(), "Event loop started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.teardown();
                        break;
                    }
                },
                Some(event) = transport.recv() => self.handle_transport(event),
            }
        }
        info!(node_id = %self.identity.node_id(), "Node stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Listen { port, reply } => {
                let _ = reply.send(self.listen(port).await);
            }
            Command::BindDatagram { port, reply } => {
                let _ = reply.send(self.bind_datagram(port).await);
            }
            Command::LocalAddrs { reply } => {
                let _ = reply.send(LocalAddrs {
                    tcp: self.listener.as_ref().map(|l| l.local),
                    udp: self.datagram.as_ref().map(|d| d.local),
                });
            }
            Command::Connect { addr, reply } => self.dial(addr, reply),
            Command::SendMessage {
                peer_id,
                content,
                reply,
            } => {
                let result = self.send_message(peer_id, &content);
                if let Err(e) = &result {
                    error!(peer = %peer_id, error = %e, "Cannot send message");
                }
                let _ = reply.send(result);
            }
            Command::SendDatagram {
                addr,
                payload,
                reply,
            } => self.send_datagram(addr, payload, reply),
            Command::Request { route, call, reply } => self.start_request(route, call, reply),
            Command::Disconnect { peer_id, reply } => {
                let was_active = self.active_peers.contains_key(&peer_id);
                let bound: Vec<ConnectionId> = self
                    .connections
                    .iter()
                    .filter(|(_, c)| c.peer_id == Some(peer_id))
                    .map(|(id, _)| *id)
                    .collect();
                if was_active {
                    info!(peer = %peer_id, connections = bound.len(), "Disconnecting peer");
                }
                for conn in bound {
                    self.close_connection(conn, Some("local disconnect".into()));
                }
                let _ = reply.send(was_active);
            }
            Command::ClosestPeers {
                target,
                count,
                reply,
            } => {
                let _ = reply.send(self.dht.find_closest_peers(target, count));
            }
            Command::RoutingTable { reply } => {
                let _ = reply.send(self.dht.routing_table().peers().to_vec());
            }
            Command::RoutingStats { reply } => {
                let _ = reply.send(self.dht.get_stats());
            }
            Command::ActivePeers { reply } => {
                let _ = reply.send(self.active_peers.keys().copied().collect());
            }
            Command::HasSession { peer_id, reply } => {
                let _ = reply.send(self.sessions.contains(&peer_id));
            }
            // Handled in `run`.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Accepted { stream, remote } => {
                let conn = self.register(stream, remote, Direction::Inbound);
                debug!(%conn, %remote, "Inbound connection open");
            }
            TransportEvent::Dialed { conn, addr, result } => self.on_dialed(conn, addr, result),
            TransportEvent::Frame { conn, frame } => self.on_frame(conn, &frame),
            TransportEvent::FrameDropped { conn, error } => {
                self.report(NodeError::FrameParse(format!("{conn}: {error}")));
            }
            TransportEvent::Closed { conn, reason } => self.close_connection(conn, reason),
            TransportEvent::Datagram { payload, source } => {
                debug!(%source, len = payload.len(), "Datagram received");
                self.events.publish(NodeEvent::StreamData { payload, source });
            }
            TransportEvent::DatagramClosed { generation, reason } => {
                let current = self
                    .datagram
                    .as_ref()
                    .is_some_and(|d| d.generation == generation);
                if let Some(closed) = self.datagram.take_if(|_| current) {
                    self.report(NodeError::BindFailure {
                        transport: "udp",
                        addr: closed.local,
                        reason,
                    });
                }
            }
        }
    }

    async fn listen(&mut self, port: u16) -> Result<SocketAddr, NodeError> {
        let addr = self.config.tcp_addr(port);
        let (local, task) = transport::listen(addr, self.transport_tx.clone())
            .await
            .inspect_err(|e| error!(error = %e, "TCP listen failed"))?;
        if let Some(old) = self.listener.replace(Listener { local, task }) {
            old.task.abort();
        }
        Ok(local)
    }

    async fn bind_datagram(&mut self, port: u16) -> Result<SocketAddr, NodeError> {
        let addr = SocketAddr::new(self.config.network.host, port);
        self.next_generation += 1;
        let generation = self.next_generation;
        let (socket, local, task) =
            transport::bind_datagram(addr, generation, self.transport_tx.clone())
                .await
                .inspect_err(|e| error!(error = %e, "UDP bind failed"))?;
        let replaced = self.datagram.replace(DatagramSocket {
            socket,
            local,
            generation,
            task,
        });
        if let Some(old) = replaced {
            old.task.abort();
        }
        Ok(local)
    }

    fn dial(&mut self, addr: SocketAddr, reply: oneshot::Sender<Result<ConnectionId, NodeError>>) {
        let conn = self.next_connection_id();
        debug!(%conn, %addr, "Dialing");
        self.dialing.insert(conn, reply);
        transport::spawn_dial(
            conn,
            addr,
            self.config.connect_timeout(),
            self.transport_tx.clone(),
        );
    }

    fn on_dialed(
        &mut self,
        conn: ConnectionId,
        addr: SocketAddr,
        result: Result<TcpStream, NodeError>,
    ) {
        let reply = self.dialing.remove(&conn);
        let outcome = match result {
            Ok(stream) => {
                self.insert_connection(conn, stream, addr, Direction::Outbound);
                info!(%conn, %addr, "Connected");
                self.send_handshake(conn);
                Ok(conn)
            }
            Err(e) => {
                warn!(%conn, %addr, error = %e, "Dial failed");
                Err(e)
            }
        };
        if let Some(reply) = reply {
            let _ = reply.send(outcome);
        }
    }

    fn register(&mut self, stream: TcpStream, remote: SocketAddr, direction: Direction) -> ConnectionId {
        let conn = self.next_connection_id();
        self.insert_connection(conn, stream, remote, direction);
        conn
    }

    fn insert_connection(
        &mut self,
        conn: ConnectionId,
        stream: TcpStream,
        remote: SocketAddr,
        direction: Direction,
    ) {
        let limits = ConnectionLimits {
            framing: self.config.transport.framing,
            max_frame_len: self.config.transport.max_frame_len,
            outbound_queue_len: self.config.transport.outbound_queue_len,
        };
        let handle = transport::spawn_connection(
            conn,
            stream,
            remote,
            direction,
            limits,
            self.transport_tx.clone(),
        );
        self.connections.insert(
            conn,
            Connection {
                handle,
                peer_id: None,
                advertised: None,
                handshake_sent: false,
            },
        );
    }

    /// Tear down a connection and clean up everything that pointed at it.
    pub(super) fn close_connection(&mut self, conn_id: ConnectionId, reason: Option<String>) {
        self.remove_connection(conn_id, reason, ConnectionHandle::close);
    }

    /// Like `close_connection`, but without waiting for the writer to flush.
    pub(super) fn abort_connection(&mut self, conn_id: ConnectionId, reason: Option<String>) {
        self.remove_connection(conn_id, reason, ConnectionHandle::abort);
    }

    fn remove_connection(
        &mut self,
        conn_id: ConnectionId,
        reason: Option<String>,
        shutdown: fn(ConnectionHandle),
    ) {
        let Some(conn) = self.connections.remove(&conn_id) else {
            return;
        };
        debug!(conn = %conn_id, ?reason, "Connection closed");
        shutdown(conn.handle);

        let orphaned: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.conn == conn_id)
            .map(|(rpc_id, _)| *rpc_id)
            .collect();
        for rpc_id in orphaned {
            if let Some(pending) = self.pending.remove(&rpc_id) {
                let _ = pending.reply.send(Err(NodeError::ConnectionClosed));
            }
        }

        let Some(peer_id) = conn.peer_id else {
            return;
        };
        if self.active_peers.get(&peer_id) != Some(&conn_id) {
            return;
        }
        // Another open connection to the same peer takes over the route.
        let fallback = self
            .connections
            .iter()
            .filter(|(_, c)| c.peer_id == Some(peer_id))
            .map(|(id, _)| *id)
            .max();
        match fallback {
            Some(other) => {
                debug!(peer = %peer_id, old = %conn_id, new = %other, "Peer routed to remaining connection");
                self.active_peers.insert(peer_id, other);
            }
            None => {
                self.active_peers.remove(&peer_id);
                info!(peer = %peer_id, "Peer disconnected");
                self.events.publish(NodeEvent::PeerDisconnected { id: peer_id });
            }
        }
    }

    pub(super) fn send_handshake(&mut self, conn_id: ConnectionId) {
        let listen_port = self.listener.as_ref().map(|l| l.local.port());
        let envelope = Envelope::Handshake(self.identity.handshake(listen_port));
        match self.send_envelope(conn_id, &envelope) {
            Ok(()) => {
                if let Some(conn) = self.connections.get_mut(&conn_id) {
                    conn.handshake_sent = true;
                }
            }
            Err(e) => warn!(conn = %conn_id, error = %e, "Failed to send HANDSHAKE"),
        }
    }

    /// Frame and queue an envelope on a connection.
    ///
    /// A connection whose outbound queue is full is dropped.
    pub(super) fn send_envelope(
        &mut self,
        conn_id: ConnectionId,
        envelope: &Envelope,
    ) -> Result<(), NodeError> {
        if !self.connections.contains_key(&conn_id) {
            return Err(NodeError::ConnectionClosed);
        }
        let bytes = envelope.to_bytes()?;
        let frame = encode_frame(
            self.config.transport.framing,
            &bytes,
            self.config.transport.max_frame_len,
        )
        .map_err(|e| NodeError::FrameParse(e.to_string()))?;
        debug!(conn = %conn_id, kind = envelope.kind(), len = frame.len(), "Sending frame");

        let result = self
            .connections
            .get(&conn_id)
            .ok_or(NodeError::ConnectionClosed)
            .and_then(|conn| conn.handle.send(frame));
        if let Err(NodeError::OutboundQueueFull) = result {
            warn!(conn = %conn_id, "Remote is not reading, dropping connection");
            self.abort_connection(conn_id, Some("outbound queue full".into()));
        }
        result
    }

    fn send_message(&mut self, peer_id: NodeId, content: &str) -> Result<(), NodeError> {
        let conn = *self
            .active_peers
            .get(&peer_id)
            .ok_or(NodeError::NotConnected(peer_id))?;
        let payload = self.sessions.encrypt(&peer_id, content.as_bytes())?;
        let envelope = Envelope::Message(MessageRecord {
            from_id: self.identity.node_id(),
            payload: (&payload).into(),
            timestamp: self.dht.now().as_millis(),
        });
        self.send_envelope(conn, &envelope)
    }

    fn send_datagram(
        &self,
        addr: SocketAddr,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), NodeError>>,
    ) {
        let Some(datagram) = &self.datagram else {
            let _ = reply.send(Err(NodeError::NotBound));
            return;
        };
        let socket = Arc::clone(&datagram.socket);
        tokio::spawn(async move {
            let result = transport::send_datagram(&socket, addr, &payload).await;
            if let Err(e) = &result {
                warn!(%addr, error = %e, "Datagram send failed");
            }
            let _ = reply.send(result);
        });
    }

    fn start_request(
        &mut self,
        route: Route,
        call: DhtCall,
        reply: oneshot::Sender<Result<DhtReply, NodeError>>,
    ) {
        self.pending.retain(|_, p| !p.reply.is_closed());

        let conn = match route {
            Route::Peer(peer_id) => match self.active_peers.get(&peer_id) {
                Some(conn) => *conn,
                None => {
                    let _ = reply.send(Err(NodeError::NotConnected(peer_id)));
                    return;
                }
            },
            Route::Connection(conn) => conn,
        };

        self.next_rpc += 1;
        let rpc_id = self.next_rpc;
        let sender_id = self.identity.node_id();
        let envelope = match call {
            DhtCall::Ping => Envelope::Ping(PingRecord {
                sender_id,
                rpc_id: Some(rpc_id),
            }),
            DhtCall::FindNode(target_id) => Envelope::FindNode(FindNodeRecord {
                sender_id,
                target_id,
                rpc_id: Some(rpc_id),
            }),
        };

        match self.send_envelope(conn, &envelope) {
            Ok(()) => {
                self.pending.insert(rpc_id, PendingRequest { conn, reply });
            }
            Err(e) => {
                let _ = reply.send(Err(e));
            }
        }
    }

    /// Publish a dropped-frame style error.
    pub(super) fn report(&self, error: NodeError) {
        self.events.publish(NodeEvent::Error {
            kind: error.kind(),
            detail: error.to_string(),
        });
    }

    fn next_connection_id(&mut self) -> ConnectionId {
        self.next_conn += 1;
        ConnectionId(self.next_conn)
    }

    fn teardown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.task.abort();
        }
        if let Some(datagram) = self.datagram.take() {
            datagram.task.abort();
        }
        for (_, conn) in self.connections.drain() {
            conn.handle.close();
        }
        for (_, reply) in self.dialing.drain() {
            let _ = reply.send(Err(NodeError::Shutdown));
        }
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(NodeError::Shutdown));
        }
        self.active_peers.clear();
    }
}
