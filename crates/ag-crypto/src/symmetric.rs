//! # Symmetric Session Encryption
//!
//! AES-256-GCM with a fresh random 96-bit nonce per message.
//!
//! The session key is derived once per handshake as `SHA-256(shared_secret)`
//! and reused for every message to that peer until the next handshake.

use crate::{agreement::SharedSecret, hashing::sha256, CryptoError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Session key (256-bit).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the session key from an ECDH shared secret.
    pub fn derive(secret: &SharedSecret) -> Self {
        Self(sha256(secret.as_bytes()))
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// One encrypted message: `{ nonce, ciphertext, tag }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// 96-bit nonce, unique per message.
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext without the tag.
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl EncryptedPayload {
    /// Rebuild a payload from raw parts, checking fixed lengths.
    pub fn from_parts(nonce: &[u8], ciphertext: Vec<u8>, tag: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] =
            nonce
                .try_into()
                .map_err(|_| CryptoError::InvalidNonceLength {
                    expected: NONCE_LEN,
                    actual: nonce.len(),
                })?;
        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| CryptoError::AuthenticationFailure)?;
        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }
}

/// Encrypts and decrypts messages for one peer session.
///
/// Transport and dispatch code only sees this trait, so a ratcheting scheme
/// can replace [`StaticKeyCipher`] without changes elsewhere.
pub trait SessionCipher: Send + Sync {
    /// Encrypt a message.
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError>;

    /// Decrypt a message.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::AuthenticationFailure` for any tampering or key mismatch.
    fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError>;
}

/// Single static AES-256-GCM key per session.
pub struct StaticKeyCipher {
    key: SessionKey,
}

impl StaticKeyCipher {
    /// Create a cipher from a session key.
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    /// Derive the key from a shared secret and create the cipher.
    pub fn from_shared_secret(secret: &SharedSecret) -> Self {
        Self::new(SessionKey::derive(secret))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_bytes()))
    }
}

impl SessionCipher for StaticKeyCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut sealed = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext
        let split = sealed
            .len()
            .checked_sub(TAG_LEN)
            .ok_or_else(|| CryptoError::EncryptionFailed("sealed output too short".into()))?;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&sealed[split..]);
        sealed.truncate(split);

        Ok(EncryptedPayload {
            nonce,
            ciphertext: sealed,
            tag,
        })
    }

    fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        let mut sealed = Vec::with_capacity(payload.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&payload.ciphertext);
        sealed.extend_from_slice(&payload.tag);

        self.cipher()
            .decrypt(Nonce::from_slice(&payload.nonce), sealed.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}
