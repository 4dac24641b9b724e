//! AirCom radio transport boundary.
//!
//! The [`RadioTransport`] contract the mesh core is written against, the
//! well-known ports, and an in-memory [`LoopbackHub`] used when no radio
//! stack is linked.

#![warn(missing_docs)]

pub mod loopback;
pub mod ports;
pub mod transport;

pub use loopback::{
    LoopbackHub, LoopbackTransport, SentFrame, SentTo, INBOUND_CAPACITY, SENT_LOG_CAPACITY,
};
pub use ports::{COT_PORT, DISCOVERY_PORT, TEXT_PORT, VOICE_PORT};
pub use transport::{InboundFrame, LinkQuality, PeerInfo, RadioTransport};
