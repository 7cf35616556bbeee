//! # Wire Envelope
//!
//! Reliable-channel records are JSON objects tagged by `"type"`.
//!
//! | type | fields |
//! |------|--------|
//! | `HANDSHAKE` | `id`, `pubKey`, `ecdhKey`, `signature`, `listenPort?` |
//! | `MESSAGE` | `fromId`, `payload{iv,ciphertext,authTag}`, `timestamp` |
//! | `PING` | `senderId`, `rpcId?` |
//! | `FIND_NODE` | `senderId`, `targetId`, `rpcId?` |
//! | `PONG` | `senderId`, `rpcId?` |
//! | `NODES` | `senderId`, `nodes[{id,address,lastSeen}]`, `rpcId?` |
//! | `ERROR` | `message`, `rpcId?` |
//!
//! Byte fields are lowercase hex. Node ids are 64 hex characters.

use crate::error::NodeError;
use ag_crypto::{CryptoError, EncryptedPayload};
use ag_peer_discovery::{DhtRequest, DhtResponse, NodeId, PeerRecord, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record types that decode into [`Envelope`].
pub const KNOWN_TYPES: &[&str] = &[
    "HANDSHAKE",
    "MESSAGE",
    "PING",
    "FIND_NODE",
    "PONG",
    "NODES",
    "ERROR",
];

/// A typed reliable-channel record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Identity and session key advertisement.
    #[serde(rename = "HANDSHAKE")]
    Handshake(HandshakeRecord),
    /// Encrypted application message.
    #[serde(rename = "MESSAGE")]
    Message(MessageRecord),
    /// DHT liveness request.
    #[serde(rename = "PING")]
    Ping(PingRecord),
    /// DHT lookup request.
    #[serde(rename = "FIND_NODE")]
    FindNode(FindNodeRecord),
    /// Reply to PING.
    #[serde(rename = "PONG")]
    Pong(PongRecord),
    /// Reply to FIND_NODE.
    #[serde(rename = "NODES")]
    Nodes(NodesRecord),
    /// Reply to an unknown DHT command.
    #[serde(rename = "ERROR")]
    Error(ErrorRecord),
}

/// HANDSHAKE fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRecord {
    /// Sender's node id.
    #[serde(with = "node_id_hex")]
    pub id: NodeId,
    /// Ed25519 public key, hex.
    pub pub_key: String,
    /// secp256k1 agreement key (uncompressed SEC1), hex.
    pub ecdh_key: String,
    /// Ed25519 signature over `id || ecdhKey`, hex.
    pub signature: String,
    /// Port the sender accepts connections on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

/// MESSAGE fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Sender's node id.
    #[serde(with = "node_id_hex")]
    pub from_id: NodeId,
    /// Encrypted content.
    pub payload: WirePayload,
    /// Sender clock, milliseconds since epoch.
    pub timestamp: u64,
}

/// `{ iv, ciphertext, authTag }`, all hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayload {
    /// 12-byte nonce.
    pub iv: String,
    /// Ciphertext without tag.
    pub ciphertext: String,
    /// 16-byte GCM tag.
    pub auth_tag: String,
}

impl From<&EncryptedPayload> for WirePayload {
    fn from(payload: &EncryptedPayload) -> Self {
        Self {
            iv: hex::encode(payload.nonce),
            ciphertext: hex::encode(&payload.ciphertext),
            auth_tag: hex::encode(payload.tag),
        }
    }
}

impl TryFrom<&WirePayload> for EncryptedPayload {
    type Error = CryptoError;

    fn try_from(wire: &WirePayload) -> Result<Self, Self::Error> {
        let nonce = hex::decode(&wire.iv)?;
        let ciphertext = hex::decode(&wire.ciphertext)?;
        let tag = hex::decode(&wire.auth_tag)?;
        EncryptedPayload::from_parts(&nonce, ciphertext, &tag)
    }
}

/// PING fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRecord {
    /// Requesting node.
    #[serde(with = "node_id_hex")]
    pub sender_id: NodeId,
    /// Request correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<u64>,
}

/// FIND_NODE fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindNodeRecord {
    /// Requesting node.
    #[serde(with = "node_id_hex")]
    pub sender_id: NodeId,
    /// Id being looked up.
    #[serde(with = "node_id_hex")]
    pub target_id: NodeId,
    /// Request correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<u64>,
}

/// PONG fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongRecord {
    /// Responding node.
    #[serde(with = "node_id_hex")]
    pub sender_id: NodeId,
    /// Echo of the request's correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<u64>,
}

/// NODES fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodesRecord {
    /// Responding node.
    #[serde(with = "node_id_hex")]
    pub sender_id: NodeId,
    /// Closest peers, closest first.
    pub nodes: Vec<WirePeer>,
    /// Echo of the request's correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<u64>,
}

/// One entry of a NODES list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePeer {
    /// Peer id.
    #[serde(with = "node_id_hex")]
    pub id: NodeId,
    /// `ip:port`.
    pub address: String,
    /// Milliseconds since epoch.
    pub last_seen: u64,
}

impl From<&PeerRecord> for WirePeer {
    fn from(peer: &PeerRecord) -> Self {
        Self {
            id: peer.node_id,
            address: peer.address.to_string(),
            last_seen: peer.last_seen.as_millis(),
        }
    }
}

impl WirePeer {
    /// Convert to a routing record, `None` if the address does not parse.
    pub fn to_record(&self) -> Option<PeerRecord> {
        let address = self.address.parse().ok()?;
        Some(PeerRecord::new(self.id, address, Timestamp::new(self.last_seen)))
    }
}

/// ERROR fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Human-readable reason.
    pub message: String,
    /// Echo of the request's correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_id: Option<u64>,
}

/// Outcome of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A record this node understands.
    Known(Envelope),
    /// Unrecognised type carrying `senderId`: a DHT command we do not implement.
    UnknownDhtCommand {
        /// The `type` value.
        command: String,
        /// Correlation id to echo.
        rpc_id: Option<u64>,
    },
    /// Unrecognised type with no DHT shape.
    UnknownType(String),
}

impl Envelope {
    /// Serialize to compact JSON (never contains a raw newline).
    pub fn to_bytes(&self) -> Result<Vec<u8>, NodeError> {
        serde_json::to_vec(self).map_err(|e| NodeError::FrameParse(e.to_string()))
    }

    /// The `type` tag of this record.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "HANDSHAKE",
            Self::Message(_) => "MESSAGE",
            Self::Ping(_) => "PING",
            Self::FindNode(_) => "FIND_NODE",
            Self::Pong(_) => "PONG",
            Self::Nodes(_) => "NODES",
            Self::Error(_) => "ERROR",
        }
    }

    /// Build the reply record for a DHT response.
    pub fn from_dht_response(response: DhtResponse, rpc_id: Option<u64>) -> Self {
        match response {
            DhtResponse::Pong { sender_id } => Self::Pong(PongRecord { sender_id, rpc_id }),
            DhtResponse::Nodes { sender_id, nodes } => Self::Nodes(NodesRecord {
                sender_id,
                nodes: nodes.iter().map(WirePeer::from).collect(),
                rpc_id,
            }),
            DhtResponse::Error { message } => Self::Error(ErrorRecord { message, rpc_id }),
        }
    }

    /// Split a DHT request record into the domain request and its rpc id.
    pub fn as_dht_request(&self) -> Option<(DhtRequest, Option<u64>)> {
        match self {
            Self::Ping(r) => Some((
                DhtRequest::Ping {
                    sender_id: r.sender_id,
                },
                r.rpc_id,
            )),
            Self::FindNode(r) => Some((
                DhtRequest::FindNode {
                    sender_id: r.sender_id,
                    target_id: r.target_id,
                },
                r.rpc_id,
            )),
            _ => None,
        }
    }
}

/// Decode one frame.
///
/// # Errors
///
/// `FrameParse` if the frame is not a JSON object with a string `type`, or a
/// known type is missing fields.
pub fn decode_frame(frame: &[u8]) -> Result<Inbound, NodeError> {
    let value: Value =
        serde_json::from_slice(frame).map_err(|e| NodeError::FrameParse(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| NodeError::FrameParse("missing \"type\" field".into()))?
        .to_string();

    if KNOWN_TYPES.contains(&kind.as_str()) {
        let envelope = serde_json::from_value(value)
            .map_err(|e| NodeError::FrameParse(format!("{kind}: {e}")))?;
        return Ok(Inbound::Known(envelope));
    }

    if value.get("senderId").is_some() {
        let rpc_id = value.get("rpcId").and_then(Value::as_u64);
        return Ok(Inbound::UnknownDhtCommand {
            command: kind,
            rpc_id,
        });
    }

    Ok(Inbound::UnknownType(kind))
}

mod node_id_hex {
    use ag_peer_discovery::NodeId;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &NodeId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeId, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
