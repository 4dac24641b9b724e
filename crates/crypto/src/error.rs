//! Error types for the security layer.

use aircom_proto::PacketError;
use thiserror::Error;

/// Decryption refused. Carries no plaintext and no detail about which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Nonce has the wrong length
    #[error("Malformed nonce: {0} bytes")]
    MalformedNonce(usize),

    /// Tag mismatch, tampering, truncation or wrong key
    #[error("Authentication failed")]
    Failed,
}

/// Security layer errors other than authentication.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed
    #[error("Encryption failed")]
    Encryption,

    /// Envelope did not authenticate
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Decrypted key share does not hold a 32-byte key
    #[error("Key share holds {0} bytes, expected 32")]
    InvalidKeyLength(usize),

    /// Key-share packet could not be built
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

/// Result type for security layer operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
