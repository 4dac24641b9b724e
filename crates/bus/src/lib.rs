//! AirCom message bus.
//!
//! Bounded, typed channels connecting the node's tasks (UI, audio, network,
//! GPS). Each channel has a fixed capacity and an overflow policy chosen
//! for the latency needs of its producers.

#![warn(missing_docs)]

pub mod bus;
pub mod channel;
pub mod error;
pub mod messages;

pub use bus::MessageBus;
pub use channel::{ChannelStats, OverflowPolicy, QueueChannel, SendOutcome};
pub use error::{BusError, BusResult};
pub use messages::{AudioCommand, IncomingMessage, LockUpdate, MessageBody, OutgoingMessage, UiUpdate};
