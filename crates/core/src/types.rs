//! Core types

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unique identifier for a node in the mesh
pub type NodeId = String;

/// Longest node identifier accepted on the wire, in bytes.
pub const MAX_NODE_ID_LEN: usize = 32;

/// Get current timestamp in milliseconds since Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
