//! Routing Table Implementation
//!
//! A single flat bucket of capacity k, ordered by recency. Large deployments
//! would shard this into per-distance-band buckets behind the same
//! `add_peer` / `find_closest_peers` contract.

// Semantic submodules
mod bucket;
mod stats;
mod table;

// Re-export public API
pub use bucket::KBucket;
pub use stats::{AddPeerOutcome, RoutingTableStats};
pub use table::RoutingTable;
