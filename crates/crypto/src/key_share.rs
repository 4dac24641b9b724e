//! Group key distribution to a single peer.
//!
//! Two messages: the initiator seals the new group key under a temporary
//! key shared out of band and sends it to the peer as an encrypted
//! envelope; the peer opens it with the same temporary key and installs
//! the group key. Each temporary key protects exactly one share and is
//! wiped on both sides once that share has been sealed or authenticated.
//! An envelope that fails authentication leaves the receiver's key armed.

use crate::error::{CryptoError, CryptoResult};
use crate::gateway::{open, seal, SecurityGateway};
use crate::keys::{fingerprint, TemporaryKey, KEY_LEN};
use aircom_core::NodeId;
use aircom_proto::{EncryptedEnvelope, Packet, Payload};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, warn};
use zeroize::Zeroize;

/// Build the key-share packet for `to_node`. Consumes the temporary key.
pub fn initiate_key_share(
    temporary: TemporaryKey,
    from_node: &str,
    to_node: &str,
    group_key: &[u8; KEY_LEN],
) -> CryptoResult<Packet> {
    let envelope = seal(temporary.as_bytes(), group_key)?;
    drop(temporary);

    let packet = Packet::unicast(from_node, to_node, Payload::EncryptedEnvelope(envelope))?;
    info!(
        to = %to_node,
        fingerprint = %fingerprint(group_key),
        "Key share sent"
    );
    Ok(packet)
}

/// Open a key share and install the group key it carries. Consumes the temporary key.
pub fn accept_key_share(
    temporary: TemporaryKey,
    envelope: &EncryptedEnvelope,
    gateway: &dyn SecurityGateway,
) -> CryptoResult<()> {
    let opened = open(temporary.as_bytes(), envelope);
    drop(temporary);
    install_group_key(opened?, gateway)
}

fn install_group_key(mut plaintext: Vec<u8>, gateway: &dyn SecurityGateway) -> CryptoResult<()> {
    if plaintext.len() != KEY_LEN {
        let len = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength(len));
    }

    let mut group_key = [0u8; KEY_LEN];
    group_key.copy_from_slice(&plaintext);
    plaintext.zeroize();

    gateway.set_group_key(group_key);
    group_key.zeroize();
    Ok(())
}

/// Temporary keys armed for incoming key shares, one per peer.
#[derive(Default)]
pub struct KeyShareRegistry {
    armed: Mutex<HashMap<NodeId, TemporaryKey>>,
}

impl KeyShareRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a key share from `peer`. Replaces (and wipes) any earlier key.
    pub fn arm(&self, peer: impl Into<NodeId>, key: TemporaryKey) {
        let peer = peer.into();
        info!(peer = %peer, "Key share armed");
        self.armed.lock().insert(peer, key);
    }

    /// Whether a key share from `peer` would be accepted.
    pub fn is_armed(&self, peer: &str) -> bool {
        self.armed.lock().contains_key(peer)
    }

    /// Number of armed peers.
    pub fn len(&self) -> usize {
        self.armed.lock().len()
    }

    /// No peers armed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try `envelope` as a key share from `peer`.
    ///
    /// Returns `None` if no key is armed for `peer`. The armed key is
    /// consumed once an envelope authenticates under it; an envelope that
    /// fails authentication is rejected and the key stays armed.
    pub fn accept(
        &self,
        peer: &str,
        envelope: &EncryptedEnvelope,
        gateway: &dyn SecurityGateway,
    ) -> Option<CryptoResult<()>> {
        let mut armed = self.armed.lock();
        let opened = open(armed.get(peer)?.as_bytes(), envelope);
        let result = match opened {
            Ok(plaintext) => {
                armed.remove(peer);
                drop(armed);
                install_group_key(plaintext, gateway)
            }
            Err(err) => Err(err.into()),
        };

        match &result {
            Ok(()) => info!(peer = %peer, "Key share accepted"),
            Err(err) => warn!(peer = %peer, error = %err, "Key share rejected"),
        }
        Some(result)
    }
}
