//! # Antigravity Benchmarks
//!
//! Hot paths on the node's receive side.

pub mod peer_discovery;
pub mod sessions;

use criterion::Criterion;

/// Register every benchmark group.
pub fn register_benchmarks(c: &mut Criterion) {
    peer_discovery::register_benchmarks(c);
    sessions::register_benchmarks(c);
}
