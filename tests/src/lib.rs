//! # Antigravity Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion benchmarks for hot paths
//! │   ├── peer_discovery.rs
//! │   └── sessions.rs
//! │
//! └── integration/      # Real nodes on 127.0.0.1 ephemeral ports
//!     ├── handshake.rs
//!     ├── messaging.rs
//!     ├── dht.rs
//!     ├── framing.rs
//!     ├── datagram.rs
//!     └── lifecycle.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ag-tests
//!
//! # By category
//! cargo test -p ag-tests integration::handshake
//! cargo test -p ag-tests integration::dht
//!
//! # Benchmarks
//! cargo bench -p ag-tests
//! ```

pub mod benchmarks;
