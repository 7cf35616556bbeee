//! Kademlia distance calculation.

use crate::domain::{Distance, NodeId};

/// Calculate the XOR distance between two NodeIds
///
/// # Properties
/// - Symmetric: `xor_distance(a, b) == xor_distance(b, a)`
/// - Self is zero: `xor_distance(a, a) == Distance::ZERO`
/// - Distinct ids are never at distance zero
#[inline]
pub fn xor_distance(a: &NodeId, b: &NodeId) -> Distance {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a_bytes[i] ^ b_bytes[i];
    }
    Distance(out)
}
