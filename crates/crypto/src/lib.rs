//! Security layer for the AirCom mesh.
//!
//! This crate provides payload confidentiality and integrity for mesh
//! packets, group key rotation, and single-use key shares to individual
//! peers.
//!
//! # Supported Algorithms
//!
//! - **Encryption**: ChaCha20-Poly1305 with random 96-bit nonces
//! - **Fingerprints**: BLAKE3
//!
//! # Security Principles
//!
//! - Decryption fails closed; no partial plaintext ever leaves the gateway
//! - Secrets are never logged, only fingerprints
//! - Key material is zeroized on drop and after single use
//! - No key material is persisted here

pub mod error;
pub mod gateway;
pub mod key_share;
pub mod keys;

pub use error::{AuthError, CryptoError, CryptoResult};
pub use gateway::{GroupKeyGateway, SecurityGateway, NONCE_LEN};
pub use key_share::{accept_key_share, initiate_key_share, KeyShareRegistry};
pub use keys::{fingerprint, random_key, GroupKey, TemporaryKey, KEY_LEN};
