//! Error types for the message bus.

use thiserror::Error;

/// Errors raised while building channels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Channels are bounded and need room for at least one item
    #[error("Channel {name} capacity must be non-zero")]
    ZeroCapacity {
        /// Channel name
        name: &'static str,
    },
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
