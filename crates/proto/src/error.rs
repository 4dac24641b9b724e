//! Packet construction and codec errors

use thiserror::Error;

/// A packet that violates the protocol's structural rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketError {
    /// Node identifiers must be non-empty
    #[error("Node id is empty")]
    EmptyNodeId,

    /// Node identifier longer than the wire limit
    #[error("Node id is {len} bytes, limit is {max}")]
    NodeIdTooLong {
        /// Actual length in bytes
        len: usize,
        /// Wire limit
        max: usize,
    },

    /// Only discovery and health packets may omit the destination
    #[error("{kind} packets cannot be broadcast")]
    BroadcastNotAllowed {
        /// Payload variant name
        kind: &'static str,
    },

    /// Link-quality SNR must be a finite number
    #[error("SNR {snr} is not finite")]
    NonFiniteSnr {
        /// Rejected value
        snr: f32,
    },

    /// Encoded packet does not fit a single datagram
    #[error("Encoded packet is {len} bytes, datagram limit is {max}")]
    Oversize {
        /// Encoded length including the length prefix
        len: usize,
        /// Datagram limit
        max: usize,
    },
}

/// Failure to turn bytes into a [`crate::Packet`].
///
/// Decoding never panics and never yields a partially populated packet.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer ends before the length prefix or the frame it announces
    #[error("Buffer truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to complete the frame
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Datagram larger than the UDP path allows
    #[error("Datagram is {len} bytes, limit is {max}")]
    Oversize {
        /// Datagram length
        len: usize,
        /// Datagram limit
        max: usize,
    },

    /// Datagram holds bytes past the end of the packet
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    /// No variant set, or a variant tag this node does not know
    #[error("Unknown or missing packet variant")]
    UnknownVariant,

    /// Protobuf-level decoding failure
    #[error("Malformed packet: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// Structurally valid protobuf carrying an invalid packet
    #[error("Invalid packet: {0}")]
    Invalid(#[from] PacketError),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
