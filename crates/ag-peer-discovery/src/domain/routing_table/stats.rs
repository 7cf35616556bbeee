use crate::domain::PeerRecord;

/// What `RoutingTable::add_peer` did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddPeerOutcome {
    /// New peer appended; table had room.
    Inserted,
    /// Known peer refreshed and moved to the most recent position.
    Updated,
    /// Table was full; the returned least recently seen peer was dropped.
    Evicted(PeerRecord),
    /// The record carried our own id.
    IgnoredSelf,
}

impl AddPeerOutcome {
    /// True when the record is now in the table.
    pub fn is_member(&self) -> bool {
        !matches!(self, Self::IgnoredSelf)
    }
}

/// Routing table statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTableStats {
    /// Peers currently stored
    pub total_peers: usize,
    /// Configured capacity (k)
    pub capacity: usize,
    /// Age of the least recently seen peer, in milliseconds
    pub oldest_peer_age_ms: u64,
}
