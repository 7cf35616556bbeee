//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application implements.

use crate::domain::Timestamp;

/// Abstract interface for getting current time.
///
/// Allows tests to control time without sleeping.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}
