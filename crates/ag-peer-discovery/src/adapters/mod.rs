//! Adapters for the driven ports.

mod time;

pub use time::SystemTimeSource;
