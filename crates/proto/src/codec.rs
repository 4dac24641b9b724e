//! PacketCodec: packets to length-prefixed protobuf frames and back.
//!
//! Every frame is a varint length prefix followed by one [`WirePacket`].
//! UDP paths carry exactly one frame per datagram, bounded by
//! [`MAX_DATAGRAM_LEN`]; TCP paths carry a stream of frames and use
//! [`decode_frame`] to split it.

use crate::error::{DecodeError, PacketError, Result};
use crate::packet::{EncryptedEnvelope, Packet, Payload};
use crate::wire::{self, wire_packet::Variant, WirePacket};
use prost::Message;

/// Largest datagram accepted or produced on UDP paths.
pub const MAX_DATAGRAM_LEN: usize = 1500;

const MAX_VARINT_LEN: usize = 10;

/// Encode a packet as one length-prefixed frame. Deterministic.
pub fn encode(packet: &Packet) -> Vec<u8> {
    to_wire(packet).encode_length_delimited_to_vec()
}

/// Encode a packet for a UDP path, rejecting frames over [`MAX_DATAGRAM_LEN`].
pub fn encode_datagram(packet: &Packet) -> std::result::Result<Vec<u8>, PacketError> {
    let bytes = encode(packet);
    if bytes.len() > MAX_DATAGRAM_LEN {
        return Err(PacketError::Oversize {
            len: bytes.len(),
            max: MAX_DATAGRAM_LEN,
        });
    }
    Ok(bytes)
}

/// Decode a datagram holding exactly one frame.
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    if bytes.len() > MAX_DATAGRAM_LEN {
        return Err(DecodeError::Oversize {
            len: bytes.len(),
            max: MAX_DATAGRAM_LEN,
        });
    }

    let (packet, consumed) = decode_frame(bytes)?;
    if consumed != bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(packet)
}

/// Decode the first frame of a stream buffer.
///
/// Returns the packet and the number of bytes it occupied. A buffer that
/// ends mid-frame yields [`DecodeError::Truncated`]; the caller keeps the
/// bytes and retries once more data has arrived.
pub fn decode_frame(bytes: &[u8]) -> Result<(Packet, usize)> {
    if bytes.is_empty() {
        return Err(DecodeError::Truncated {
            needed: 1,
            available: 0,
        });
    }

    let body_len = prost::decode_length_delimiter(bytes).map_err(|err| {
        if bytes.len() < MAX_VARINT_LEN {
            DecodeError::Truncated {
                needed: bytes.len() + 1,
                available: bytes.len(),
            }
        } else {
            DecodeError::Malformed(err)
        }
    })?;
    let prefix_len = prost::length_delimiter_len(body_len);
    let frame_len = prefix_len.saturating_add(body_len);

    if bytes.len() < frame_len {
        return Err(DecodeError::Truncated {
            needed: frame_len,
            available: bytes.len(),
        });
    }

    let wire = WirePacket::decode(&bytes[prefix_len..frame_len])?;
    Ok((from_wire(wire)?, frame_len))
}

fn to_wire(packet: &Packet) -> WirePacket {
    let variant = match packet.payload() {
        Payload::NodeInfo { callsign, node_id } => Variant::NodeInfo(wire::NodeInfo {
            callsign: callsign.clone(),
            node_id: node_id.clone(),
        }),
        Payload::TextMessage { text } => {
            Variant::TextMessage(wire::TextMessage { text: text.clone() })
        }
        Payload::NetworkHealth { rssi, snr } => Variant::NetworkHealth(wire::NetworkHealth {
            rssi: *rssi,
            snr: *snr,
        }),
        Payload::CotMessage { xml } => Variant::CotMessage(wire::CotMessage { xml: xml.clone() }),
        Payload::HealthCheckRequest { sent_at } => {
            Variant::HealthCheckRequest(wire::HealthCheckRequest { sent_at: *sent_at })
        }
        Payload::HealthCheckResponse { echoed_at, rssi } => {
            Variant::HealthCheckResponse(wire::HealthCheckResponse {
                echoed_at: *echoed_at,
                rssi: *rssi,
            })
        }
        Payload::EncryptedEnvelope(envelope) => {
            Variant::EncryptedEnvelope(wire::EncryptedEnvelope {
                nonce: envelope.nonce.clone(),
                ciphertext: envelope.ciphertext.clone(),
            })
        }
    };

    WirePacket {
        from_node: packet.from_node().to_string(),
        to_node: packet.to_node().map(str::to_string),
        variant: Some(variant),
    }
}

fn from_wire(wire: WirePacket) -> Result<Packet> {
    let payload = match wire.variant.ok_or(DecodeError::UnknownVariant)? {
        Variant::NodeInfo(info) => Payload::NodeInfo {
            callsign: info.callsign,
            node_id: info.node_id,
        },
        Variant::TextMessage(msg) => Payload::TextMessage { text: msg.text },
        Variant::NetworkHealth(health) => Payload::NetworkHealth {
            rssi: health.rssi,
            snr: health.snr,
        },
        Variant::CotMessage(cot) => Payload::CotMessage { xml: cot.xml },
        Variant::HealthCheckRequest(req) => Payload::HealthCheckRequest {
            sent_at: req.sent_at,
        },
        Variant::HealthCheckResponse(resp) => Payload::HealthCheckResponse {
            echoed_at: resp.echoed_at,
            rssi: resp.rssi,
        },
        Variant::EncryptedEnvelope(env) => Payload::EncryptedEnvelope(EncryptedEnvelope {
            nonce: env.nonce,
            ciphertext: env.ciphertext,
        }),
    };

    Ok(Packet::new(wire.from_node, wire.to_node, payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text_packet(text: &str) -> Packet {
        Packet::unicast(
            "node-1",
            "node-2",
            Payload::TextMessage {
                text: text.to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_encode_is_deterministic() {
        let packet = text_packet("rally at checkpoint bravo");
        assert_eq!(encode(&packet), encode(&packet));
    }

    #[test]
    fn test_stream_of_frames_splits() {
        let first = text_packet("one");
        let second = Packet::broadcast("node-1", Payload::HealthCheckRequest { sent_at: 42 }).unwrap();

        let mut stream = encode(&first);
        stream.extend(encode(&second));

        let (decoded, used) = decode_frame(&stream).unwrap();
        assert_eq!(decoded, first);
        let (decoded, rest) = decode_frame(&stream[used..]).unwrap();
        assert_eq!(decoded, second);
        assert_eq!(used + rest, stream.len());
    }

    #[test]
    fn test_missing_variant_is_unknown() {
        let wire = WirePacket {
            from_node: "node-1".into(),
            to_node: None,
            variant: None,
        };
        let bytes = wire.encode_length_delimited_to_vec();
        assert!(matches!(decode(&bytes), Err(DecodeError::UnknownVariant)));
    }

    #[test]
    fn test_wire_broadcast_text_is_invalid() {
        let wire = WirePacket {
            from_node: "node-1".into(),
            to_node: None,
            variant: Some(Variant::TextMessage(wire::TextMessage { text: "x".into() })),
        };
        let bytes = wire.encode_length_delimited_to_vec();
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::Invalid(PacketError::BroadcastNotAllowed { .. }))
        ));
    }

    #[test]
    fn test_wire_nan_snr_is_invalid() {
        let wire = WirePacket {
            from_node: "node-1".into(),
            to_node: None,
            variant: Some(Variant::NetworkHealth(wire::NetworkHealth {
                rssi: -70,
                snr: f32::NAN,
            })),
        };
        let bytes = wire.encode_length_delimited_to_vec();
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::Invalid(PacketError::NonFiniteSnr { .. }))
        ));
    }

    #[test]
    fn test_oversize_datagram_rejected_both_ways() {
        let packet = text_packet(&"a".repeat(MAX_DATAGRAM_LEN));
        assert!(matches!(
            encode_datagram(&packet),
            Err(PacketError::Oversize { .. })
        ));

        let bytes = encode(&packet);
        assert!(matches!(decode(&bytes), Err(DecodeError::Oversize { .. })));
        // stream path has no datagram bound
        assert_eq!(decode_frame(&bytes).unwrap().0, packet);
    }

    fn node_id() -> impl Strategy<Value = String> {
        "[a-z0-9-]{1,32}"
    }

    fn payload() -> impl Strategy<Value = Payload> {
        prop_oneof![
            (".{0,16}", node_id())
                .prop_map(|(callsign, node_id)| Payload::NodeInfo { callsign, node_id }),
            ".{0,200}".prop_map(|text| Payload::TextMessage { text }),
            (any::<i32>(), -50.0f32..50.0f32)
                .prop_map(|(rssi, snr)| Payload::NetworkHealth { rssi, snr }),
            ".{0,200}".prop_map(|xml| Payload::CotMessage { xml }),
            any::<u64>().prop_map(|sent_at| Payload::HealthCheckRequest { sent_at }),
            (any::<u64>(), any::<i32>())
                .prop_map(|(echoed_at, rssi)| Payload::HealthCheckResponse { echoed_at, rssi }),
            (
                prop::collection::vec(any::<u8>(), 12),
                prop::collection::vec(any::<u8>(), 0..256)
            )
                .prop_map(|(nonce, ciphertext)| Payload::EncryptedEnvelope(
                    EncryptedEnvelope { nonce, ciphertext }
                )),
        ]
    }

    fn packet() -> impl Strategy<Value = Packet> {
        (node_id(), prop::option::of(node_id()), payload()).prop_map(|(from, to, payload)| {
            match to {
                Some(to) => Packet::unicast(from, to, payload),
                None if payload.allows_broadcast() => Packet::broadcast(from, payload),
                None => Packet::unicast(from, "node-0", payload),
            }
            .unwrap()
        })
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_packet(packet in packet()) {
            let bytes = encode(&packet);
            prop_assert!(bytes.len() <= MAX_DATAGRAM_LEN);
            prop_assert_eq!(decode(&bytes).unwrap(), packet);
        }

        #[test]
        fn decode_arbitrary_bytes_never_panics(
            bytes in prop::collection::vec(any::<u8>(), 0..512)
        ) {
            let _ = decode(&bytes);
            let _ = decode_frame(&bytes);
        }
    }
}
