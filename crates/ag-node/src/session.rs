//! # Session Store
//!
//! One live session per peer. Re-handshaking replaces the previous session.

use crate::error::NodeError;
use ag_crypto::{CryptoError, EncryptedPayload, SessionCipher};
use ag_peer_discovery::{NodeId, Timestamp};
use std::collections::HashMap;

/// Encryption state shared with one peer.
pub struct Session {
    /// Remote node id.
    pub peer_id: NodeId,
    /// When the handshake completed.
    pub established_at: Timestamp,
    cipher: Box<dyn SessionCipher>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer_id", &self.peer_id)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}

/// Per-peer sessions, owned by the node event loop.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<NodeId, Session>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, replacing any previous one.
    ///
    /// Returns `true` if a session was replaced.
    pub fn establish(
        &mut self,
        peer_id: NodeId,
        cipher: Box<dyn SessionCipher>,
        now: Timestamp,
    ) -> bool {
        self.sessions
            .insert(
                peer_id,
                Session {
                    peer_id,
                    established_at: now,
                    cipher,
                },
            )
            .is_some()
    }

    /// Check for a session.
    pub fn contains(&self, peer_id: &NodeId) -> bool {
        self.sessions.contains_key(peer_id)
    }

    /// Session metadata.
    pub fn get(&self, peer_id: &NodeId) -> Option<&Session> {
        self.sessions.get(peer_id)
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Encrypt for a peer.
    ///
    /// # Errors
    ///
    /// `NoSession` if no handshake with the peer has completed.
    pub fn encrypt(&self, peer_id: &NodeId, plaintext: &[u8]) -> Result<EncryptedPayload, NodeError> {
        let session = self
            .sessions
            .get(peer_id)
            .ok_or(NodeError::NoSession(*peer_id))?;
        Ok(session.cipher.encrypt(plaintext)?)
    }

    /// Decrypt a message from a peer.
    ///
    /// # Errors
    ///
    /// `NoSession` if there is no session, `AuthenticationFailure` if the tag
    /// does not verify. Neither affects the stored session.
    pub fn decrypt(&self, peer_id: &NodeId, payload: &EncryptedPayload) -> Result<Vec<u8>, NodeError> {
        let session = self
            .sessions
            .get(peer_id)
            .ok_or(NodeError::NoSession(*peer_id))?;
        session.cipher.decrypt(payload).map_err(|e| match e {
            CryptoError::AuthenticationFailure => NodeError::AuthenticationFailure(*peer_id),
            other => NodeError::Crypto(other),
        })
    }
}
