//! Radio transport contract.
//!
//! The core never talks to a radio stack directly. Everything it needs
//! from the link layer is behind [`RadioTransport`]; inbound traffic is
//! polled rather than delivered through callbacks, so no component has to
//! register a closure whose owner may already be gone.

use serde::{Deserialize, Serialize};

/// Peer visible on the link layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Link-layer peer identifier
    pub peer_id: String,
    /// Address accepted by [`RadioTransport::send_unicast`]
    pub address: String,
    /// Last measured signal strength, dBm
    pub rssi: i32,
    /// Peer is associated
    pub is_connected: bool,
}

/// Link quality as seen by this node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    /// Received signal strength, dBm
    pub rssi: i32,
    /// Signal to noise ratio, dB
    pub snr: f32,
}

impl Default for LinkQuality {
    fn default() -> Self {
        Self { rssi: -100, snr: 0.0 }
    }
}

/// Bytes received from the link.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// Sender address, usable for replies
    pub source: String,
    /// Destination port on this node
    pub port: u16,
    /// Frame contents
    pub payload: Vec<u8>,
    /// Signal strength the frame arrived with, dBm
    pub rssi: i32,
    /// Signal to noise ratio the frame arrived with, dB
    pub snr: f32,
}

/// Send/receive primitives provided by the radio stack.
///
/// Sends return `false` when the stack rejected the frame; they may block
/// up to the stack's own timeout.
pub trait RadioTransport: Send + Sync {
    /// Bring the link up.
    fn begin(&self) -> bool;

    /// Send to one address.
    fn send_unicast(&self, address: &str, port: u16, payload: &[u8]) -> bool;

    /// Send to every node listening on `port`.
    fn send_multicast(&self, port: u16, payload: &[u8]) -> bool;

    /// Peers currently visible.
    fn list_peers(&self) -> Vec<PeerInfo>;

    /// Whether the link is up.
    fn connection_status(&self) -> bool;

    /// Next received frame, if any. Never blocks.
    fn poll_inbound(&self) -> Option<InboundFrame>;

    /// Current link quality.
    fn link_quality(&self) -> LinkQuality {
        LinkQuality::default()
    }
}
