use crate::domain::{KademliaConfig, NodeId, PeerDiscoveryError, RoutingTable, Timestamp};
use crate::ports::TimeSource;

/// DHT service implementing the `PeerDirectory` driving port.
///
/// # Example
///
/// ```rust
/// use ag_peer_discovery::{DhtService, KademliaConfig, NodeId, PeerDirectory, SystemTimeSource};
///
/// let local_id = NodeId::new([0u8; 32]);
/// let service = DhtService::new(local_id, KademliaConfig::default(), Box::new(SystemTimeSource::new()))
///     .unwrap();
///
/// assert_eq!(service.get_stats().total_peers, 0);
/// ```
pub struct DhtService {
    /// The underlying routing table (domain layer)
    pub(crate) routing_table: RoutingTable,
    /// Time source for stamping `last_seen`
    pub(crate) time_source: Box<dyn TimeSource>,
}

impl DhtService {
    /// Create a new DHT service.
    ///
    /// # Errors
    ///
    /// `ZeroCapacity` if `config.k` is 0.
    pub fn new(
        local_node_id: NodeId,
        config: KademliaConfig,
        time_source: Box<dyn TimeSource>,
    ) -> Result<Self, PeerDiscoveryError> {
        Ok(Self {
            routing_table: RoutingTable::new(local_node_id, config)?,
            time_source,
        })
    }

    /// Get the current timestamp from the time source.
    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Our own node id.
    pub fn local_node_id(&self) -> &NodeId {
        self.routing_table.local_node_id()
    }

    /// Get the underlying routing table.
    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }
}

impl std::fmt::Debug for DhtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhtService")
            .field("routing_table", &self.routing_table)
            .finish_non_exhaustive()
    }
}
