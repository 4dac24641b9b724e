//! Packet model.
//!
//! A [`Packet`] is the unit exchanged between nodes: a sender, an optional
//! destination and exactly one [`Payload`] variant. Packets are validated at
//! construction and immutable afterwards, so every value of this type can be
//! encoded and decoded back to an equal value. Non-finite SNR readings are
//! rejected for that reason.

use crate::error::PacketError;
use aircom_core::{NodeId, MAX_NODE_ID_LEN};

/// Encrypted inner packet, produced by a security gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// AEAD nonce
    pub nonce: Vec<u8>,
    /// Ciphertext including the authentication tag
    pub ciphertext: Vec<u8>,
}

/// Packet body. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Presence announcement
    NodeInfo {
        /// Operator callsign
        callsign: String,
        /// Announced node identifier
        node_id: NodeId,
    },
    /// Free text
    TextMessage {
        /// Message body
        text: String,
    },
    /// Link quality as measured by the sender
    NetworkHealth {
        /// Received signal strength, dBm
        rssi: i32,
        /// Signal to noise ratio, dB
        snr: f32,
    },
    /// Cursor-on-Target XML event
    CotMessage {
        /// CoT document
        xml: String,
    },
    /// Latency check
    HealthCheckRequest {
        /// Sender clock, unix epoch milliseconds
        sent_at: u64,
    },
    /// Answer to a latency check
    HealthCheckResponse {
        /// `sent_at` of the request being answered
        echoed_at: u64,
        /// RSSI at which the request was received
        rssi: i32,
    },
    /// Encrypted inner packet
    EncryptedEnvelope(EncryptedEnvelope),
}

impl Payload {
    /// Variant name, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::NodeInfo { .. } => "NodeInfo",
            Payload::TextMessage { .. } => "TextMessage",
            Payload::NetworkHealth { .. } => "NetworkHealth",
            Payload::CotMessage { .. } => "CotMessage",
            Payload::HealthCheckRequest { .. } => "HealthCheckRequest",
            Payload::HealthCheckResponse { .. } => "HealthCheckResponse",
            Payload::EncryptedEnvelope(_) => "EncryptedEnvelope",
        }
    }

    /// Discovery and health variants are the only ones sent without a destination.
    pub fn allows_broadcast(&self) -> bool {
        matches!(
            self,
            Payload::NodeInfo { .. }
                | Payload::NetworkHealth { .. }
                | Payload::HealthCheckRequest { .. }
        )
    }
}

/// A validated mesh packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    from_node: NodeId,
    to_node: Option<NodeId>,
    payload: Payload,
}

impl Packet {
    /// Packet addressed to a single node.
    pub fn unicast(
        from_node: impl Into<NodeId>,
        to_node: impl Into<NodeId>,
        payload: Payload,
    ) -> Result<Self, PacketError> {
        Self::new(from_node.into(), Some(to_node.into()), payload)
    }

    /// Packet without a destination. Only discovery and health variants qualify.
    pub fn broadcast(from_node: impl Into<NodeId>, payload: Payload) -> Result<Self, PacketError> {
        Self::new(from_node.into(), None, payload)
    }

    pub(crate) fn new(
        from_node: NodeId,
        to_node: Option<NodeId>,
        payload: Payload,
    ) -> Result<Self, PacketError> {
        validate_node_id(&from_node)?;
        match &to_node {
            Some(to) => validate_node_id(to)?,
            None if !payload.allows_broadcast() => {
                return Err(PacketError::BroadcastNotAllowed {
                    kind: payload.kind(),
                })
            }
            None => {}
        }
        if let Payload::NetworkHealth { snr, .. } = &payload {
            if !snr.is_finite() {
                return Err(PacketError::NonFiniteSnr { snr: *snr });
            }
        }

        Ok(Self {
            from_node,
            to_node,
            payload,
        })
    }

    pub fn from_node(&self) -> &str {
        &self.from_node
    }

    /// Destination, `None` for broadcasts.
    pub fn to_node(&self) -> Option<&str> {
        self.to_node.as_deref()
    }

    pub fn is_broadcast(&self) -> bool {
        self.to_node.is_none()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

/// Check a node identifier against the wire limit.
pub fn validate_node_id(node_id: &str) -> Result<(), PacketError> {
    if node_id.is_empty() {
        return Err(PacketError::EmptyNodeId);
    }
    if node_id.len() > MAX_NODE_ID_LEN {
        return Err(PacketError::NodeIdTooLong {
            len: node_id.len(),
            max: MAX_NODE_ID_LEN,
        });
    }
    Ok(())
}
