//! # Peer Discovery & Routing
//!
//! Kademlia-style peer directory for Antigravity nodes.
//!
//! ## Zero-Dependency Core
//!
//! Everything in this crate uses `std` only. Wire encoding of the DHT
//! messages and the transports that carry them live in `ag-node`, which
//! turns frames into [`DhtRequest`] values and sends back the returned
//! [`DhtResponse`].
//!
//! ## Architecture
//!
//! - **Domain Layer:** node ids, XOR distance, the flat bounded routing table
//! - **Ports Layer:** `TimeSource` and the `PeerDirectory` API
//! - **Service Layer:** `DhtService`, answering PING / FIND_NODE requests
//! - **Adapters Layer:** `SystemTimeSource`
//!
//! ## Example
//!
//! ```rust
//! use ag_peer_discovery::{KademliaConfig, NodeId, PeerRecord, RoutingTable, Timestamp};
//!
//! let local_id = NodeId::new([0u8; 32]);
//! let mut table = RoutingTable::new(local_id, KademliaConfig::default()).unwrap();
//!
//! let peer = PeerRecord::new(
//!     NodeId::new([1u8; 32]),
//!     "192.168.1.100:5000".parse().unwrap(),
//!     Timestamp::new(1000),
//! );
//! table.add_peer(peer);
//!
//! let closest = table.find_closest_peers(&NodeId::new([1u8; 32]), 20);
//! assert_eq!(closest.len(), 1);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Domain entities
pub use domain::{
    AddPeerOutcome, DhtRequest, DhtResponse, Distance, KBucket, KademliaConfig, NodeId,
    ParseNodeIdError, PeerDiscoveryError, PeerRecord, RoutingTable, RoutingTableStats, Timestamp,
};

// Domain services
pub use domain::{find_k_closest, sort_peers_by_distance, xor_distance};

// Ports
pub use ports::{PeerDirectory, TimeSource};

// Service
pub use service::DhtService;

// Adapters
pub use adapters::SystemTimeSource;
