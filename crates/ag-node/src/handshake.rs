//! # Handshake
//!
//! A HANDSHAKE advertises the sender's identity key, its session agreement
//! key, and an Ed25519 signature over `node_id || agreement_key` so the
//! receiver can bind the agreement key to the claimed id.

use crate::envelope::HandshakeRecord;
use crate::error::HandshakeError;
use ag_crypto::{
    AgreementKeyPair, AgreementPublicKey, IdentityKeyPair, IdentityPublicKey, IdentitySignature,
};
use ag_peer_discovery::NodeId;

/// Local keys used to build and answer handshakes.
pub struct LocalIdentity {
    signing: IdentityKeyPair,
    agreement: AgreementKeyPair,
    node_id: NodeId,
}

impl LocalIdentity {
    /// Wrap freshly generated keys.
    pub fn new(signing: IdentityKeyPair, agreement: AgreementKeyPair) -> Self {
        let node_id = NodeId::new(signing.node_id_bytes());
        Self {
            signing,
            agreement,
            node_id,
        }
    }

    /// Our node id.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Session agreement keys.
    pub fn agreement(&self) -> &AgreementKeyPair {
        &self.agreement
    }

    /// Build our HANDSHAKE record.
    pub fn handshake(&self, listen_port: Option<u16>) -> HandshakeRecord {
        let ecdh = self.agreement.public_key().to_sec1_bytes();
        let signature = self.signing.sign(&signed_bytes(&self.node_id, &ecdh));

        HandshakeRecord {
            id: self.node_id,
            pub_key: self.signing.public_key().to_hex(),
            ecdh_key: hex::encode(&ecdh),
            signature: signature.to_hex(),
            listen_port,
        }
    }
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// A handshake whose id and signature checked out.
#[derive(Debug, Clone)]
pub struct VerifiedHandshake {
    /// Remote node id.
    pub peer_id: NodeId,
    /// Remote session agreement key.
    pub agreement_key: AgreementPublicKey,
    /// Remote listening port, if advertised.
    pub listen_port: Option<u16>,
}

/// Check a received HANDSHAKE.
///
/// # Errors
///
/// - `InvalidKey` if a key or the signature does not decode
/// - `IdMismatch` if `SHA-256(pubKey) != id`
/// - `BadSignature` if the signature does not verify
pub fn verify_handshake(record: &HandshakeRecord) -> Result<VerifiedHandshake, HandshakeError> {
    let identity =
        IdentityPublicKey::from_hex(&record.pub_key).map_err(HandshakeError::InvalidKey)?;

    if NodeId::new(identity.node_id_bytes()) != record.id {
        return Err(HandshakeError::IdMismatch { claimed: record.id });
    }

    let agreement_key =
        AgreementPublicKey::from_hex(&record.ecdh_key).map_err(HandshakeError::InvalidKey)?;
    let signature =
        IdentitySignature::from_hex(&record.signature).map_err(HandshakeError::InvalidKey)?;

    let signed = signed_bytes(&record.id, &agreement_key.to_sec1_bytes());
    identity
        .verify(&signed, &signature)
        .map_err(|_| HandshakeError::BadSignature)?;

    Ok(VerifiedHandshake {
        peer_id: record.id,
        agreement_key,
        listen_port: record.listen_port,
    })
}

fn signed_bytes(node_id: &NodeId, agreement_key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + agreement_key.len());
    out.extend_from_slice(node_id.as_bytes());
    out.extend_from_slice(agreement_key);
    out
}
