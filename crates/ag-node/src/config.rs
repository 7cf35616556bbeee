//! # Node Configuration
//!
//! Sources, later overriding earlier:
//!
//! 1. Defaults
//! 2. TOML file (`NodeConfig::load`)
//! 3. Environment (`AG_HOST`, `AG_TCP_PORT`, `AG_UDP_PORT`, `AG_BOOTSTRAP`,
//!    `AG_HANDSHAKE_MODE`)
//! 4. Command-line flags (binary only)

use crate::error::NodeError;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::framing::{FramingStrategy, DEFAULT_MAX_FRAME_LEN};
use crate::transport::DEFAULT_OUTBOUND_QUEUE_LEN;
use ag_peer_discovery::KademliaConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Routing table configuration.
    pub kademlia: KademliaSection,
    /// Handshake behaviour.
    pub session: SessionConfig,
    /// Transport tuning.
    pub transport: TransportConfig,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface both transports bind to.
    pub host: IpAddr,
    /// Reliable transport port.
    pub tcp_port: u16,
    /// Datagram transport port.
    pub udp_port: u16,
    /// Bootstrap node addresses (`ip:port`) joined at startup.
    pub bootstrap_nodes: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            tcp_port: 5000,
            udp_port: 5000,
            bootstrap_nodes: Vec::new(),
        }
    }
}

/// Serializable mirror of [`KademliaConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KademliaSection {
    /// Table capacity.
    pub k: usize,
    /// DHT request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for KademliaSection {
    fn default() -> Self {
        KademliaConfig::default().into()
    }
}

impl From<KademliaConfig> for KademliaSection {
    fn from(c: KademliaConfig) -> Self {
        Self {
            k: c.k,
            request_timeout_ms: c.request_timeout_ms,
        }
    }
}

impl From<&KademliaSection> for KademliaConfig {
    fn from(s: &KademliaSection) -> Self {
        Self {
            k: s.k,
            request_timeout_ms: s.request_timeout_ms,
        }
    }
}

/// Whether a receiver answers a HANDSHAKE with its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeMode {
    /// The receiver replies on a connection it has not yet sent a HANDSHAKE on,
    /// so both sides end up with a session.
    #[default]
    Mutual,
    /// Only the dialer sends HANDSHAKE. The receiver gets a session for the
    /// dialer but not the other way round.
    InitiatorOnly,
}

impl FromStr for HandshakeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "mutual" => Ok(Self::Mutual),
            "initiator_only" | "initiator" => Ok(Self::InitiatorOnly),
            other => Err(format!("unknown handshake mode: {other}")),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Handshake behaviour.
    pub handshake_mode: HandshakeMode,
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Frame boundary rule on TCP.
    pub framing: FramingStrategy,
    /// Largest accepted frame in bytes.
    pub max_frame_len: usize,
    /// Dial timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Event and transport channel capacity.
    pub event_channel_capacity: usize,
    /// Frames queued per connection before a slow reader is disconnected.
    pub outbound_queue_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            framing: FramingStrategy::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            connect_timeout_ms: 5_000,
            event_channel_capacity: DEFAULT_EVENT_CAPACITY,
            outbound_queue_len: DEFAULT_OUTBOUND_QUEUE_LEN,
        }
    }
}

impl NodeConfig {
    /// Config for tests: loopback, ephemeral ports, short timeouts.
    pub fn for_testing() -> Self {
        Self {
            network: NetworkConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                tcp_port: 0,
                udp_port: 0,
                bootstrap_nodes: Vec::new(),
            },
            kademlia: KademliaSection {
                k: 20,
                request_timeout_ms: 2_000,
            },
            session: SessionConfig::default(),
            transport: TransportConfig {
                connect_timeout_ms: 2_000,
                ..TransportConfig::default()
            },
        }
    }

    /// Parse from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `AG_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are logged and
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("AG_HOST") {
            match host.parse() {
                Ok(ip) => self.network.host = ip,
                Err(_) => warn!(value = %host, "Ignoring invalid AG_HOST"),
            }
        }
        if let Some(port) = lookup("AG_TCP_PORT") {
            match port.parse() {
                Ok(p) => self.network.tcp_port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid AG_TCP_PORT"),
            }
        }
        if let Some(port) = lookup("AG_UDP_PORT") {
            match port.parse() {
                Ok(p) => self.network.udp_port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid AG_UDP_PORT"),
            }
        }
        if let Some(list) = lookup("AG_BOOTSTRAP") {
            self.network.bootstrap_nodes = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(mode) = lookup("AG_HANDSHAKE_MODE") {
            match mode.parse() {
                Ok(m) => self.session.handshake_mode = m,
                Err(e) => warn!(error = %e, "Ignoring invalid AG_HANDSHAKE_MODE"),
            }
        }
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.kademlia.k == 0 {
            return Err(NodeError::Config("kademlia.k must be at least 1".into()));
        }
        if self.transport.max_frame_len == 0 {
            return Err(NodeError::Config(
                "transport.max_frame_len must be at least 1".into(),
            ));
        }
        if self.transport.event_channel_capacity == 0 {
            return Err(NodeError::Config(
                "transport.event_channel_capacity must be at least 1".into(),
            ));
        }
        if self.transport.outbound_queue_len == 0 {
            return Err(NodeError::Config(
                "transport.outbound_queue_len must be at least 1".into(),
            ));
        }
        self.bootstrap_addrs()?;
        Ok(())
    }

    /// Parsed bootstrap addresses.
    pub fn bootstrap_addrs(&self) -> Result<Vec<SocketAddr>, NodeError> {
        self.network
            .bootstrap_nodes
            .iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| NodeError::Config(format!("invalid bootstrap address: {s}")))
            })
            .collect()
    }

    /// Domain routing config.
    pub fn kademlia_config(&self) -> KademliaConfig {
        KademliaConfig::from(&self.kademlia)
    }

    /// TCP bind address for `port`.
    pub fn tcp_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.network.host, port)
    }

    /// DHT request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.kademlia.request_timeout_ms)
    }

    /// Dial timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.connect_timeout_ms)
    }
}
