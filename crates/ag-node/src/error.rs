//! # Node Errors
//!
//! | Error | Handling |
//! |-------|----------|
//! | `BindFailure` | reported to the caller, transport stays unbound |
//! | `DialFailure` | reported, never retried |
//! | `FrameParse` | frame dropped, connection kept |
//! | `NoSession` | encrypt/decrypt rejected |
//! | `AuthenticationFailure` | message dropped, session kept |
//! | `UnknownMessageType` / `UnknownDhtCommand` | ignored or answered with `ERROR` |

use ag_crypto::CryptoError;
use ag_peer_discovery::NodeId;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced by node operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// A transport could not bind its socket.
    #[error("failed to bind {transport} on {addr}: {reason}")]
    BindFailure {
        /// "tcp" or "udp".
        transport: &'static str,
        /// Requested address.
        addr: SocketAddr,
        /// OS error text.
        reason: String,
    },

    /// An outbound connection could not be established.
    #[error("failed to dial {addr}: {reason}")]
    DialFailure {
        /// Remote address.
        addr: SocketAddr,
        /// OS error text or "timed out".
        reason: String,
    },

    /// A frame was not a valid envelope.
    #[error("frame parse error: {0}")]
    FrameParse(String),

    /// No session exists for the peer.
    #[error("no secure session with peer {0}")]
    NoSession(NodeId),

    /// Decryption failed authentication.
    #[error("authentication failed for message from {0}")]
    AuthenticationFailure(NodeId),

    /// Envelope `type` not recognised.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The remote answered a DHT request with `ERROR`.
    #[error("remote rejected DHT command: {0}")]
    UnknownDhtCommand(String),

    /// No open connection to the peer.
    #[error("no connection to peer {0}")]
    NotConnected(NodeId),

    /// A request got no answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The datagram transport is not bound.
    #[error("datagram socket is not bound")]
    NotBound,

    /// The connection closed while a request was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// The remote stopped draining its connection and the outbound queue filled.
    #[error("outbound queue full")]
    OutboundQueueFull,

    /// A handshake was rejected.
    #[error("handshake rejected: {0}")]
    Handshake(#[from] HandshakeError),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The node event loop has stopped.
    #[error("node is shut down")]
    Shutdown,
}

impl NodeError {
    /// Event-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BindFailure { .. } | Self::DialFailure { .. } | Self::NotBound => {
                ErrorKind::Transport
            }
            Self::ConnectionClosed
            | Self::OutboundQueueFull
            | Self::NotConnected(_)
            | Self::Shutdown => ErrorKind::Transport,
            Self::FrameParse(_) => ErrorKind::FrameParse,
            Self::NoSession(_) => ErrorKind::NoSession,
            Self::AuthenticationFailure(_) | Self::Crypto(_) => ErrorKind::AuthenticationFailure,
            Self::UnknownMessageType(_) => ErrorKind::UnknownMessageType,
            Self::UnknownDhtCommand(_) => ErrorKind::UnknownDhtCommand,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Coarse error category carried by `NodeEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket-level failure.
    Transport,
    /// Malformed frame.
    FrameParse,
    /// Missing session.
    NoSession,
    /// Tag check failed.
    AuthenticationFailure,
    /// Unrecognised envelope type.
    UnknownMessageType,
    /// Unrecognised DHT command.
    UnknownDhtCommand,
    /// Rejected handshake.
    Handshake,
    /// Request timed out.
    Timeout,
    /// Bad configuration.
    Config,
}

/// Reasons a HANDSHAKE is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// `SHA-256(pubKey)` does not match the advertised id.
    #[error("node id {claimed} does not match its public key")]
    IdMismatch {
        /// Id the peer claimed.
        claimed: NodeId,
    },

    /// A key field could not be decoded.
    #[error("invalid key material: {0}")]
    InvalidKey(CryptoError),

    /// The signature over `id || ecdhKey` did not verify.
    #[error("handshake signature did not verify")]
    BadSignature,

    /// The connection is already bound to a different node id.
    #[error("connection already bound to {bound}, refusing {claimed}")]
    IdentityChanged {
        /// Id from the first accepted handshake.
        bound: NodeId,
        /// Id in the rejected handshake.
        claimed: NodeId,
    },
}

/// Framing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A frame (or pending unterminated data) exceeded the limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    Oversized {
        /// Observed length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The payload contains the frame delimiter.
    #[error("payload contains the frame delimiter")]
    DelimiterInPayload,
}
