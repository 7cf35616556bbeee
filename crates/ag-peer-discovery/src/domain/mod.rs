//! Domain Layer - Pure business logic with no I/O
//!
//! - Node identifiers and XOR distance
//! - Flat, recency-ordered routing table with bounded capacity
//! - DHT request/response vocabulary

pub mod entities;
pub mod errors;
pub mod protocol;
pub mod routing_table;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use protocol::*;
pub use routing_table::*;
pub use services::*;
pub use value_objects::*;
