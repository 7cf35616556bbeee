//! # DHT Service
//!
//! Wraps the domain `RoutingTable` with a `TimeSource` and answers the DHT
//! request/response protocol:
//!
//! | Request | Effect | Reply |
//! |---------|--------|-------|
//! | `PING` | sender added to the table | `PONG` with our id |
//! | `FIND_NODE(target)` | sender added to the table | `NODES` with the k closest to `target` |
//! | anything else | none | `ERROR` naming the command |

// Semantic submodules
mod api;
mod core;
mod dht;

// Re-export public API
pub use core::DhtService;
