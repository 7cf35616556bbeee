//! # Session Key Agreement (ECDH over secp256k1)
//!
//! Each node holds one agreement keypair per run, separate from its signing
//! identity. It is advertised in every HANDSHAKE the node sends, so two
//! connections between the same pair of nodes (one dialed each way) agree on
//! the same shared secret.

use crate::CryptoError;
use k256::{ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Uncompressed SEC1 public key length.
pub const AGREEMENT_PUBLIC_KEY_LEN: usize = 65;

/// A peer's agreement public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgreementPublicKey(PublicKey);

impl AgreementPublicKey {
    /// Parse SEC1 bytes (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Parse from hex-encoded SEC1 bytes.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_sec1_bytes(&hex::decode(s)?)
    }

    /// Uncompressed SEC1 encoding (65 bytes, leading 0x04).
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Lowercase hex of the uncompressed encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_sec1_bytes())
    }
}

/// Raw ECDH output: the x-coordinate of the shared point.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Agreement keypair generated once per node run.
pub struct AgreementKeyPair {
    secret: SecretKey,
    public: AgreementPublicKey,
}

impl AgreementKeyPair {
    /// Generate a random keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = AgreementPublicKey(secret.public_key());
        Self { secret, public }
    }

    /// Our public half.
    pub fn public_key(&self) -> &AgreementPublicKey {
        &self.public
    }

    /// Compute the shared secret with a remote public key.
    pub fn agree(&self, remote: &AgreementPublicKey) -> SharedSecret {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), remote.0.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        SharedSecret(out)
    }
}

impl std::fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementKeyPair")
            .field("public", &self.public.to_hex())
            .finish_non_exhaustive()
    }
}
