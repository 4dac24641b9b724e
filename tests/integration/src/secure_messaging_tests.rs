//! Encrypted messaging and group key distribution
//!
//! # Test Scenarios
//!
//! 1. **Text delivery**: text sent to a contact arrives with the sender's callsign
//! 2. **CoT delivery**: CoT events go to the CoT port
//! 3. **Tampered envelope**: a flipped ciphertext byte is discarded
//! 4. **Key share**: armed peers move to the new key and keep talking
//! 5. **Unarmed key share**: an unexpected share never changes the key
//! 6. **Spoofed share**: a forged envelope does not burn the armed key
//! 7. **Oversize CoT**: CoT beyond one datagram never reaches the radio

use crate::test_utils::{init_test_logging, settle, TestNode};
use aircom_bus::MessageBody;
use aircom_core::{ErrorCategory, ErrorCode};
use aircom_crypto::TemporaryKey;
use aircom_proto::{codec, EncryptedEnvelope, Packet, Payload};
use aircom_radio::{InboundFrame, LoopbackHub, RadioTransport, SentTo, COT_PORT, TEXT_PORT};

const TEMP_KEY: [u8; 32] = [0x3c; 32];

#[tokio::test]
async fn test_encrypted_text_delivery_with_callsign() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;

    a.send_text("node-b", "contact front, two hundred meters").await;
    a.router.tick().await;
    b.router.tick().await;

    let incoming = b.bus.incoming_message.try_receive().unwrap();
    assert_eq!(incoming.from_node, "node-a");
    assert_eq!(incoming.callsign, "ALPHA");
    assert_eq!(
        incoming.body,
        MessageBody::Text("contact front, two hundred meters".into())
    );
    assert_eq!(b.recovery.stats().total_errors, 0);
}

#[tokio::test]
async fn test_cot_delivered_on_cot_port() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;

    let xml = r#"<event uid="ALPHA" type="a-f-G"><point lat="34.1" lon="-117.2"/></event>"#;
    a.send_cot("node-b", xml).await;
    a.router.tick().await;

    assert!(a.transport.sent_frames().iter().any(|f| {
        f.destination
            == SentTo::Unicast {
                address: "B".into(),
                port: COT_PORT,
            }
    }));

    b.router.tick().await;
    let incoming = b.bus.incoming_message.try_receive().unwrap();
    assert_eq!(incoming.body, MessageBody::Cot(xml.into()));
}

#[tokio::test]
async fn test_tampered_envelope_discarded() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;
    while b.transport.poll_inbound().is_some() {}

    // Capture A's sealed frame without delivering it.
    b.transport.set_connected(false);
    a.send_text("node-b", "authentic").await;
    a.router.tick().await;
    b.transport.set_connected(true);

    let frame = a
        .transport
        .sent_frames()
        .into_iter()
        .rev()
        .find(|f| matches!(f.destination, SentTo::Unicast { port, .. } if port == TEXT_PORT))
        .unwrap();
    let (packet, _) = codec::decode_frame(&frame.payload).unwrap();
    let mut envelope = match packet.payload() {
        Payload::EncryptedEnvelope(envelope) => envelope.clone(),
        other => panic!("expected envelope, got {}", other.kind()),
    };
    envelope.ciphertext[0] ^= 0x01;
    let tampered = Packet::unicast("node-a", "node-b", Payload::EncryptedEnvelope(envelope)).unwrap();

    b.transport.inject(InboundFrame {
        source: "A".into(),
        port: TEXT_PORT,
        payload: codec::encode(&tampered),
        rssi: -60,
        snr: 10.0,
    });
    b.router.tick().await;

    assert!(b.bus.incoming_message.try_receive().is_none());
    assert_eq!(b.recovery.stats().errors_in(ErrorCategory::Crypto), 1);
}

#[tokio::test]
async fn test_key_share_exchange() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    let c = TestNode::new(&hub, "C", "node-c", "CHARLIE");
    settle(&[&a, &b, &c], 2).await;
    let old_fingerprint = b.gateway.fingerprint();

    b.router
        .arm_key_share("node-a", TemporaryKey::from_bytes(TEMP_KEY));
    a.router
        .share_group_key("node-b", TemporaryKey::from_bytes(TEMP_KEY))
        .unwrap();
    b.router.tick().await;

    assert_eq!(a.gateway.fingerprint(), b.gateway.fingerprint());
    assert_ne!(b.gateway.fingerprint(), old_fingerprint);
    assert!(!b.router.key_shares().is_armed("node-a"));

    // New key both ways.
    a.send_text("node-b", "new key check").await;
    a.router.tick().await;
    b.router.tick().await;
    assert_eq!(
        b.bus.incoming_message.try_receive().unwrap().body,
        MessageBody::Text("new key check".into())
    );

    // C still holds the previous key, which B keeps for the grace period.
    c.send_text("node-b", "sent before rotation").await;
    c.router.tick().await;
    b.router.tick().await;
    let incoming = b.bus.incoming_message.try_receive().unwrap();
    assert_eq!(incoming.callsign, "CHARLIE");
    assert_eq!(b.recovery.stats().total_errors, 0);
}

#[tokio::test]
async fn test_unarmed_key_share_discarded() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;
    let before = b.gateway.fingerprint();

    a.router
        .share_group_key("node-b", TemporaryKey::from_bytes(TEMP_KEY))
        .unwrap();
    b.router.tick().await;

    assert_eq!(b.gateway.fingerprint(), before);
    assert_eq!(b.recovery.stats().errors_in(ErrorCategory::Crypto), 1);
}

#[tokio::test]
async fn test_spoofed_envelope_keeps_key_share_armed() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;
    let before = b.gateway.fingerprint();

    b.router
        .arm_key_share("node-a", TemporaryKey::from_bytes(TEMP_KEY));

    let spoofed = Packet::unicast(
        "node-a",
        "node-b",
        Payload::EncryptedEnvelope(EncryptedEnvelope {
            nonce: vec![0x11; 12],
            ciphertext: vec![0x22; 48],
        }),
    )
    .unwrap();
    b.transport.inject(InboundFrame {
        source: "Z".into(),
        port: TEXT_PORT,
        payload: codec::encode(&spoofed),
        rssi: -60,
        snr: 10.0,
    });
    b.router.tick().await;

    assert!(b.router.key_shares().is_armed("node-a"));
    assert_eq!(b.gateway.fingerprint(), before);
    assert_eq!(b.recovery.stats().errors_in(ErrorCategory::Crypto), 1);

    a.router
        .share_group_key("node-b", TemporaryKey::from_bytes(TEMP_KEY))
        .unwrap();
    b.router.tick().await;

    assert_eq!(a.gateway.fingerprint(), b.gateway.fingerprint());
    assert_ne!(b.gateway.fingerprint(), before);
    assert!(!b.router.key_shares().is_armed("node-a"));
}

#[tokio::test]
async fn test_oversize_cot_never_leaves_sender() {
    init_test_logging();
    let hub = LoopbackHub::new();
    let a = TestNode::new(&hub, "A", "node-a", "ALPHA");
    let b = TestNode::new(&hub, "B", "node-b", "BRAVO");
    settle(&[&a, &b], 2).await;

    let xml = format!(r#"<event uid="ALPHA"><detail>{}</detail></event>"#, "x".repeat(3000));
    a.send_cot("node-b", &xml).await;
    let report = a.router.tick().await;
    b.router.tick().await;

    assert!(!report.outgoing_delivered);
    assert!(!a
        .transport
        .sent_frames()
        .iter()
        .any(|f| matches!(f.destination, SentTo::Unicast { port, .. } if port == COT_PORT)));
    assert!(b.bus.incoming_message.try_receive().is_none());
    assert_eq!(
        a.recovery.stats().last_error_code,
        Some(ErrorCode::PacketTooLarge)
    );

    // small CoT still goes through afterwards
    a.send_cot("node-b", "<event/>").await;
    a.router.tick().await;
    b.router.tick().await;
    assert_eq!(
        b.bus.incoming_message.try_receive().unwrap().body,
        MessageBody::Cot("<event/>".into())
    );
}
