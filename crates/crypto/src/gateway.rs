//! Security gateway: payload confidentiality and integrity for the mesh.
//!
//! Every encrypted packet on the mesh is sealed with the current group key
//! using ChaCha20-Poly1305 and a fresh random 96-bit nonce.
//!
//! # Key Rotation
//!
//! Encryption happens when a packet is built, so a packet handed to the
//! transport is already sealed and is unaffected by a later rotation. On
//! the receiving side the gateway keeps the immediately preceding key and
//! falls back to it when the current key does not authenticate, so packets
//! sealed just before a rotation are still accepted. Older keys are wiped.

use crate::error::{AuthError, CryptoError, CryptoResult};
use crate::keys::{GroupKey, KEY_LEN};
use aircom_proto::EncryptedEnvelope;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroize;

/// Nonce size for ChaCha20-Poly1305 (96 bits / 12 bytes).
pub const NONCE_LEN: usize = 12;

/// Encrypt/decrypt interface used by the router.
///
/// `decrypt` fails closed: tampering, truncation or a wrong key yield
/// [`AuthError`], never partial plaintext.
pub trait SecurityGateway: Send + Sync {
    /// Seal `plaintext` under the current group key.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedEnvelope>;

    /// Open an envelope sealed under the current or previous group key.
    fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, AuthError>;

    /// Replace the group key with a fresh random one.
    fn rotate_group_key(&self);

    /// Replace the group key with `key`.
    fn set_group_key(&self, key: [u8; KEY_LEN]);
}

struct KeyRing {
    current: GroupKey,
    previous: Option<GroupKey>,
}

/// [`SecurityGateway`] backed by a shared ChaCha20-Poly1305 group key.
pub struct GroupKeyGateway {
    keys: RwLock<KeyRing>,
}

impl GroupKeyGateway {
    /// Gateway starting with `key`.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        let mut key = key;
        let current = GroupKey::from_bytes(key);
        key.zeroize();

        info!(fingerprint = %current.fingerprint(), "Group key installed");
        Self {
            keys: RwLock::new(KeyRing {
                current,
                previous: None,
            }),
        }
    }

    /// Gateway starting with a random key.
    pub fn generate() -> Self {
        let gateway = Self {
            keys: RwLock::new(KeyRing {
                current: GroupKey::generate(),
                previous: None,
            }),
        };
        info!(fingerprint = %gateway.fingerprint(), "Group key generated");
        gateway
    }

    /// Fingerprint of the current group key.
    pub fn fingerprint(&self) -> String {
        self.keys.read().current.fingerprint()
    }

    fn install(&self, next: GroupKey) {
        let mut ring = self.keys.write();
        let old = std::mem::replace(&mut ring.current, next);
        info!(
            previous = %old.fingerprint(),
            current = %ring.current.fingerprint(),
            "Group key rotated"
        );
        // dropping the displaced previous key wipes it
        ring.previous = Some(old);
    }
}

/// Seal `plaintext` with `key` and a fresh nonce.
pub(crate) fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> CryptoResult<EncryptedEnvelope> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    Ok(EncryptedEnvelope {
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Open an envelope with `key`.
pub(crate) fn open(key: &[u8; KEY_LEN], envelope: &EncryptedEnvelope) -> Result<Vec<u8>, AuthError> {
    if envelope.nonce.len() != NONCE_LEN {
        return Err(AuthError::MalformedNonce(envelope.nonce.len()));
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map_err(|_| AuthError::Failed)
}

impl SecurityGateway for GroupKeyGateway {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedEnvelope> {
        let ring = self.keys.read();
        seal(ring.current.as_bytes(), plaintext)
    }

    fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, AuthError> {
        let ring = self.keys.read();
        match open(ring.current.as_bytes(), envelope) {
            Ok(plaintext) => Ok(plaintext),
            Err(AuthError::Failed) => match &ring.previous {
                Some(previous) => {
                    let plaintext = open(previous.as_bytes(), envelope)?;
                    debug!("Envelope opened with previous group key");
                    Ok(plaintext)
                }
                None => Err(AuthError::Failed),
            },
            Err(err) => Err(err),
        }
    }

    fn rotate_group_key(&self) {
        self.install(GroupKey::generate());
    }

    fn set_group_key(&self, key: [u8; KEY_LEN]) {
        let mut key = key;
        self.install(GroupKey::from_bytes(key));
        key.zeroize();
    }
}
