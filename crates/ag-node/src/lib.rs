//! # Antigravity Node
//!
//! A peer-to-peer node with an Ed25519 identity, a TCP transport for framed
//! control and chat records, a UDP transport for raw media-like datagrams,
//! per-peer AES-256-GCM sessions negotiated by an ECDH handshake, and a
//! Kademlia-style routing table answering `PING` and `FIND_NODE`.
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `config` | `NodeConfig` from defaults, TOML and `AG_*` variables |
//! | `transport` | listener, dialer, per-connection reader/writer tasks, UDP socket |
//! | `framing` | newline or length-prefixed frame boundaries |
//! | `envelope` | JSON records tagged by `type` |
//! | `handshake` | signed HANDSHAKE construction and verification |
//! | `session` | per-peer ciphers |
//! | `node` | the event loop and the public [`Node`] handle |
//! | `events` | broadcast of [`NodeEvent`]s to collaborators |
//!
//! ## Example
//!
//! ```no_run
//! use ag_node::{Node, NodeConfig, NodeEvent};
//!
//! # async fn run() -> Result<(), ag_node::NodeError> {
//! let node = Node::new(NodeConfig::default())?;
//! let mut events = node.subscribe();
//! node.start().await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let NodeEvent::MessageReceived { from_id, content, .. } = event {
//!         println!("{from_id}: {content}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod framing;
pub mod handshake;
pub mod node;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::{HandshakeMode, NodeConfig};
pub use error::{ErrorKind, FrameError, HandshakeError, NodeError};
pub use events::{EventBus, EventStream, EventSubscription, NodeEvent};
pub use framing::FramingStrategy;
pub use node::{LocalAddrs, Node};
pub use transport::ConnectionId;

pub use ag_peer_discovery::{NodeId, PeerRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
