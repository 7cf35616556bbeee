//! # Node
//!
//! [`Node`] is a cheap, cloneable handle. All state lives in a single event
//! loop task ([`actor`]) that owns the routing table, sessions, active peers
//! and connections. Handles and transport tasks reach it only through
//! channels, so there is never more than one writer.
//!
//! ```text
//! Node handle ──Command──▶ ┌──────────────┐ ◀──TransportEvent── reader / accept / udp tasks
//!                          │  event loop  │
//! subscribers ◀──NodeEvent─┴──────────────┘ ──frames──▶ writer tasks
//! ```

mod actor;
mod dispatch;


use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::events::{EventBus, EventSubscription};
use crate::handshake::LocalIdentity;
use crate::transport::ConnectionId;
use actor::NodeActor;
use ag_crypto::{AgreementKeyPair, IdentityKeyPair};
use ag_peer_discovery::{NodeId, PeerRecord, RoutingTableStats};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Addresses the transports are bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalAddrs {
    /// Reliable transport.
    pub tcp: Option<SocketAddr>,
    /// Datagram transport.
    pub udp: Option<SocketAddr>,
}

/// Where a DHT request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// The connection carrying an authenticated peer.
    Peer(NodeId),
    /// A specific connection, used before the remote id is known.
    Connection(ConnectionId),
}

/// Outbound DHT request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DhtCall {
    Ping,
    FindNode(NodeId),
}

/// Reply to a [`DhtCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DhtReply {
    Pong(NodeId),
    Nodes {
        sender_id: NodeId,
        peers: Vec<PeerRecord>,
    },
}

type Reply<T> = oneshot::Sender<T>;

/// Requests from handles to the event loop.
#[derive(Debug)]
pub(crate) enum Command {
    Listen {
        port: u16,
        reply: Reply<Result<SocketAddr, NodeError>>,
    },
    BindDatagram {
        port: u16,
        reply: Reply<Result<SocketAddr, NodeError>>,
    },
    LocalAddrs {
        reply: Reply<LocalAddrs>,
    },
    Connect {
        addr: SocketAddr,
        reply: Reply<Result<ConnectionId, NodeError>>,
    },
    SendMessage {
        peer_id: NodeId,
        content: String,
        reply: Reply<Result<(), NodeError>>,
    },
    SendDatagram {
        addr: SocketAddr,
        payload: Vec<u8>,
        reply: Reply<Result<(), NodeError>>,
    },
    Request {
        route: Route,
        call: DhtCall,
        reply: Reply<Result<DhtReply, NodeError>>,
    },
    Disconnect {
        peer_id: NodeId,
        reply: Reply<bool>,
    },
    ClosestPeers {
        target: NodeId,
        count: usize,
        reply: Reply<Vec<PeerRecord>>,
    },
    RoutingTable {
        reply: Reply<Vec<PeerRecord>>,
    },
    RoutingStats {
        reply: Reply<RoutingTableStats>,
    },
    ActivePeers {
        reply: Reply<Vec<NodeId>>,
    },
    HasSession {
        peer_id: NodeId,
        reply: Reply<bool>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Handle to a running node.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    config: Arc<NodeConfig>,
    commands: mpsc::Sender<Command>,
    events: Weak<EventBus>,
}

impl Node {
    /// Generate a fresh identity and spawn the event loop.
    ///
    /// Nothing is bound until [`Node::start`], [`Node::listen`] or
    /// [`Node::bind_datagram`] is called.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is invalid, `Crypto` if key generation
    /// fails.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let identity = LocalIdentity::new(IdentityKeyPair::generate()?, AgreementKeyPair::generate());
        Self::spawn(config, identity)
    }

    fn spawn(config: NodeConfig, identity: LocalIdentity) -> Result<Self, NodeError> {
        let id = identity.node_id();
        let events = Arc::new(EventBus::with_capacity(
            config.transport.event_channel_capacity,
        ));
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let weak_events = Arc::downgrade(&events);

        let (actor, transport_rx) = NodeActor::new(config.clone(), identity, events)?;
        tokio::spawn(actor.run(command_rx, transport_rx));

        info!(node_id = %id, "Node identity generated");
        Ok(Self {
            id,
            config: Arc::new(config),
            commands,
            events: weak_events,
        })
    }

    /// Our node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Configuration the node was created with.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Subscribe to node events.
    ///
    /// After shutdown the returned subscription is already closed.
    pub fn subscribe(&self) -> EventSubscription {
        self.events
            .upgrade()
            .map(|bus| bus.subscribe())
            .unwrap_or_else(EventSubscription::closed)
    }

    /// Bind both transports on the configured ports.
    ///
    /// # Errors
    ///
    /// `BindFailure` from whichever transport failed first.
    pub async fn start(&self) -> Result<LocalAddrs, NodeError> {
        let tcp = self.listen(self.config.network.tcp_port).await?;
        let udp = self.bind_datagram(self.config.network.udp_port).await?;
        info!(node_id = %self.id, %tcp, %udp, "Node started");
        Ok(LocalAddrs {
            tcp: Some(tcp),
            udp: Some(udp),
        })
    }

    /// Start accepting reliable connections on `port` (0 for ephemeral).
    ///
    /// # Errors
    ///
    /// `BindFailure` if the port cannot be bound.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr, NodeError> {
        self.call(|reply| Command::Listen { port, reply }).await?
    }

    /// Bind the datagram socket on `port` (0 for ephemeral).
    ///
    /// # Errors
    ///
    /// `BindFailure` if the port cannot be bound.
    pub async fn bind_datagram(&self, port: u16) -> Result<SocketAddr, NodeError> {
        self.call(|reply| Command::BindDatagram { port, reply })
            .await?
    }

    /// Currently bound addresses.
    pub async fn local_addrs(&self) -> Result<LocalAddrs, NodeError> {
        self.call(|reply| Command::LocalAddrs { reply }).await
    }

    /// Dial a peer and send our HANDSHAKE.
    ///
    /// Returns once the connection is open. `PeerConnected` is emitted later,
    /// when the remote's HANDSHAKE arrives.
    ///
    /// # Errors
    ///
    /// `DialFailure` if the connection cannot be established.
    pub async fn connect(&self, addr: SocketAddr) -> Result<ConnectionId, NodeError> {
        self.call(|reply| Command::Connect { addr, reply }).await?
    }

    /// Connect to a bootstrap node and look ourselves up through it.
    ///
    /// Returned peers (excluding ourselves) have been added to the routing
    /// table.
    ///
    /// # Errors
    ///
    /// `DialFailure`, `Timeout`, or `ConnectionClosed` if the lookup fails.
    pub async fn join(&self, addr: SocketAddr) -> Result<Vec<PeerRecord>, NodeError> {
        let conn = self.connect(addr).await?;
        let reply = self
            .request(Route::Connection(conn), DhtCall::FindNode(self.id))
            .await?;
        let peers = expect_nodes(reply)?;
        let peers: Vec<_> = peers.into_iter().filter(|p| p.node_id != self.id).collect();
        info!(bootstrap = %addr, discovered = peers.len(), "Joined network");
        Ok(peers)
    }

    /// Encrypt `content` for `peer_id` and send it.
    ///
    /// # Errors
    ///
    /// `NotConnected` if there is no live connection to the peer, `NoSession`
    /// if no handshake with it has completed.
    pub async fn send_message(&self, peer_id: NodeId, content: &str) -> Result<(), NodeError> {
        let content = content.to_string();
        self.call(|reply| Command::SendMessage {
            peer_id,
            content,
            reply,
        })
        .await?
    }

    /// Send one datagram. Delivery is not guaranteed.
    ///
    /// # Errors
    ///
    /// `NotBound` if [`Node::bind_datagram`] has not succeeded.
    pub async fn send_datagram(&self, addr: SocketAddr, payload: &[u8]) -> Result<(), NodeError> {
        let payload = payload.to_vec();
        self.call(|reply| Command::SendDatagram {
            addr,
            payload,
            reply,
        })
        .await?
    }

    /// PING a connected peer. Returns the id in its PONG.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `Timeout`, `ConnectionClosed`, or `UnknownDhtCommand`
    /// if the remote answered with ERROR.
    pub async fn ping(&self, peer_id: NodeId) -> Result<NodeId, NodeError> {
        match self.request(Route::Peer(peer_id), DhtCall::Ping).await? {
            DhtReply::Pong(sender_id) => Ok(sender_id),
            DhtReply::Nodes { .. } => Err(NodeError::FrameParse(
                "expected PONG, got NODES".into(),
            )),
        }
    }

    /// Ask a connected peer for the nodes closest to `target`.
    ///
    /// # Errors
    ///
    /// As for [`Node::ping`].
    pub async fn find_node(
        &self,
        peer_id: NodeId,
        target: NodeId,
    ) -> Result<Vec<PeerRecord>, NodeError> {
        let reply = self
            .request(Route::Peer(peer_id), DhtCall::FindNode(target))
            .await?;
        expect_nodes(reply)
    }

    /// Close the connection to `peer_id`. Returns `false` if there was none.
    pub async fn disconnect(&self, peer_id: NodeId) -> Result<bool, NodeError> {
        self.call(|reply| Command::Disconnect { peer_id, reply })
            .await
    }

    /// Up to `count` known peers closest to `target`.
    pub async fn closest_peers(
        &self,
        target: NodeId,
        count: usize,
    ) -> Result<Vec<PeerRecord>, NodeError> {
        self.call(|reply| Command::ClosestPeers {
            target,
            count,
            reply,
        })
        .await
    }

    /// Snapshot of the routing table, least recently seen first.
    pub async fn routing_table(&self) -> Result<Vec<PeerRecord>, NodeError> {
        self.call(|reply| Command::RoutingTable { reply }).await
    }

    /// Routing table statistics.
    pub async fn routing_stats(&self) -> Result<RoutingTableStats, NodeError> {
        self.call(|reply| Command::RoutingStats { reply }).await
    }

    /// Ids with a live, handshaken connection.
    pub async fn active_peers(&self) -> Result<Vec<NodeId>, NodeError> {
        self.call(|reply| Command::ActivePeers { reply }).await
    }

    /// Whether a session with `peer_id` exists.
    pub async fn has_session(&self, peer_id: NodeId) -> Result<bool, NodeError> {
        self.call(|reply| Command::HasSession { peer_id, reply })
            .await
    }

    /// Stop the event loop, closing every socket. Idempotent.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        match self.call(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(NodeError::Shutdown) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| NodeError::Shutdown)?;
        rx.await.map_err(|_| NodeError::Shutdown)
    }

    async fn request(&self, route: Route, call: DhtCall) -> Result<DhtReply, NodeError> {
        let timeout = self.config.request_timeout();
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Request { route, call, reply })
            .await
            .map_err(|_| NodeError::Shutdown)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(NodeError::Shutdown),
            Err(_) => Err(NodeError::Timeout(duration_millis(timeout))),
        }
    }
}

fn expect_nodes(reply: DhtReply) -> Result<Vec<PeerRecord>, NodeError> {
    match reply {
        DhtReply::Nodes { sender_id, peers } => {
            debug!(from = %sender_id, count = peers.len(), "NODES received");
            Ok(peers)
        }
        DhtReply::Pong(_) => Err(NodeError::FrameParse("expected NODES, got PONG".into())),
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
