//! AirCom packet protocol.
//!
//! The [`Packet`] model exchanged between nodes and the PacketCodec that
//! turns it into length-prefixed protobuf frames.

pub mod codec;
pub mod error;
pub mod packet;
pub mod wire;

pub use codec::{decode, decode_frame, encode, encode_datagram, MAX_DATAGRAM_LEN};
pub use error::{DecodeError, PacketError, Result};
pub use packet::{validate_node_id, EncryptedEnvelope, Packet, Payload};
