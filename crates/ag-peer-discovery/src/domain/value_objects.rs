//! Value Objects for Peer Discovery

use std::cmp::Ordering;
use std::fmt;

/// XOR distance between two node ids.
///
/// The 32 bytes are the bitwise XOR of both ids, read as a big-endian
/// unsigned 256-bit integer. Derived `Ord` on the byte array compares
/// lexicographically, which is exactly big-endian integer order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Distance(pub [u8; 32]);

impl Distance {
    /// Distance from an id to itself.
    pub const ZERO: Distance = Distance([0u8; 32]);

    /// Maximum possible distance.
    pub const MAX: Distance = Distance([0xFF; 32]);

    /// Get the raw XOR bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if the distance is zero (identical ids).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Number of leading zero bits (0-256).
    ///
    /// This is the length of the common prefix of both ids, i.e. the
    /// distance band a classic multi-bucket table would file the peer under.
    pub fn leading_zeros(&self) -> u32 {
        let mut zeros = 0;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                return zeros + byte.leading_zeros();
            }
        }
        zeros
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Configuration for the Kademlia routing table and DHT requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KademliaConfig {
    /// Table capacity (default: 20)
    pub k: usize,
    /// How long a DHT request waits for its response, in milliseconds
    /// (default: 5000)
    pub request_timeout_ms: u64,
}

impl Default for KademliaConfig {
    fn default() -> Self {
        Self {
            k: 20,
            request_timeout_ms: 5_000,
        }
    }
}

impl KademliaConfig {
    /// Create a config suitable for testing (smaller values)
    pub fn for_testing() -> Self {
        Self {
            k: 3, // Smaller table for easier testing
            request_timeout_ms: 500,
        }
    }
}
