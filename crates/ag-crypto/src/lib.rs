//! # Antigravity Crypto - Node Identity and Session Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `identity` | Ed25519 + SHA-256 | Long-term node identity, handshake signatures |
//! | `agreement` | ECDH over secp256k1 | Per-run session key agreement |
//! | `symmetric` | AES-256-GCM | Per-peer message encryption |
//! | `hashing` | SHA-256 | Node ids, session key derivation |
//!
//! ## Session Model
//!
//! A session key is `SHA-256(ecdh_shared_x)` and stays fixed for the life of
//! the session. There is no ratchet and no rotation; callers only see the
//! [`SessionCipher`] trait so a ratcheting implementation can replace
//! [`StaticKeyCipher`] without touching transport code.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agreement;
pub mod errors;
pub mod hashing;
pub mod identity;
pub mod symmetric;

// Re-exports
pub use agreement::{AgreementKeyPair, AgreementPublicKey, SharedSecret};
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many};
pub use identity::{IdentityKeyPair, IdentityPublicKey, IdentitySignature};
pub use symmetric::{EncryptedPayload, SessionCipher, SessionKey, StaticKeyCipher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
