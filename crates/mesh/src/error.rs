//! Error types for AirCom mesh operations.

use aircom_bus::BusError;
use aircom_crypto::{AuthError, CryptoError};
use aircom_proto::{DecodeError, PacketError};
use thiserror::Error;

/// Errors that can occur in mesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A shared table stayed locked past the acquisition timeout
    #[error("Timed out acquiring {resource} lock")]
    LockTimeout {
        /// Table that could not be locked
        resource: &'static str,
    },

    /// Destination is not in the contact directory
    #[error("Unknown contact: {node_id}")]
    UnknownContact {
        /// Requested node
        node_id: String,
    },

    /// Transport rejected the frame
    #[error("Transport rejected send to {destination}")]
    SendRejected {
        /// Address or port the frame was sent to
        destination: String,
    },

    /// Packet decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Packet construction errors
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    /// Security layer errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Envelope authentication failures
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Channel construction errors
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
