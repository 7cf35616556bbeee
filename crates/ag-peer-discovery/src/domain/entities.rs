//! Core Domain Entities for Peer Discovery

use std::fmt;
use std::hash::Hash;
use std::net::SocketAddr;
use std::str::FromStr;

/// 256-bit node identifier derived from public key hash.
///
/// NodeId uniquely identifies a peer in the DHT. It is `SHA-256(public_key)`
/// of the node's long-term signing key, which binds identity to key ownership.
///
/// # Security (Timing Attack Prevention)
///
/// Equality is constant-time. Standard `PartialEq` for byte arrays
/// short-circuits on the first difference.
// SAFETY: derived_hash_with_manual_eq is intentionally allowed here.
// Equal NodeIds have equal bytes and therefore equal hashes.
#[allow(clippy::derived_hash_with_manual_eq)]
#[derive(Clone, Copy, Hash)]
pub struct NodeId(pub [u8; 32]);

impl PartialEq for NodeId {
    /// Constant-time comparison.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        let mut result = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Eq for NodeId {}

impl NodeId {
    /// Create a NodeId from raw 32-byte array.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes for XOR distance calculation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create a zero-initialized NodeId.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(8);
        s
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

/// Error parsing a hex node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseNodeIdError {
    /// Input was not exactly 64 characters.
    InvalidLength(usize),
    /// Input contained a non-hex character.
    InvalidCharacter,
}

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(f, "expected 64 hex characters, got {len}"),
            Self::InvalidCharacter => write!(f, "invalid hex character in node id"),
        }
    }
}

impl std::error::Error for ParseNodeIdError {}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.as_bytes();
        if s.len() != 64 {
            return Err(ParseNodeIdError::InvalidLength(s.len()));
        }

        fn nibble(c: u8) -> Result<u8, ParseNodeIdError> {
            match c {
                b'0'..=b'9' => Ok(c - b'0'),
                b'a'..=b'f' => Ok(c - b'a' + 10),
                b'A'..=b'F' => Ok(c - b'A' + 10),
                _ => Err(ParseNodeIdError::InvalidCharacter),
            }
        }

        let mut bytes = [0u8; 32];
        for (i, pair) in s.chunks_exact(2).enumerate() {
            bytes[i] = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        }
        Ok(Self(bytes))
    }
}

/// Peer information stored in the routing table.
///
/// Entries are unique by `node_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Unique node identifier (SHA-256 of public key).
    pub node_id: NodeId,
    /// Network address for P2P communication.
    pub address: SocketAddr,
    /// Last time we heard from this peer.
    pub last_seen: Timestamp,
}

impl PeerRecord {
    /// Create a new PeerRecord.
    pub fn new(node_id: NodeId, address: SocketAddr, last_seen: Timestamp) -> Self {
        Self {
            node_id,
            address,
            last_seen,
        }
    }
}

/// Unix timestamp in milliseconds
///
/// # Security (Timestamp Bounds)
///
/// Timestamps are clamped to a reasonable maximum so a remote peer cannot
/// poison recency ordering with `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999, in milliseconds).
    pub const MAX_REASONABLE: u64 = 253_402_300_799_000;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(millis: u64) -> Self {
        Self(millis.min(Self::MAX_REASONABLE))
    }

    /// Create a timestamp with explicit validation.
    ///
    /// # Returns
    ///
    /// `None` if `millis > MAX_REASONABLE`.
    #[inline]
    pub fn try_new(millis: u64) -> Option<Self> {
        (millis <= Self::MAX_REASONABLE).then_some(Self(millis))
    }

    /// Get the underlying milliseconds value.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add milliseconds (saturating at MAX_REASONABLE).
    pub fn add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis).min(Self::MAX_REASONABLE))
    }

    /// Subtract milliseconds (saturating at 0).
    pub fn sub_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}
