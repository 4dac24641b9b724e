//! Key material.
//!
//! Keys are zeroized on drop and never logged; logs carry a short BLAKE3
//! fingerprint instead.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of every symmetric key in the mesh.
pub const KEY_LEN: usize = 32;

/// Hex characters of fingerprint shown in logs.
const FINGERPRINT_LEN: usize = 4;

/// Short public identifier of a key.
pub fn fingerprint(key: &[u8; KEY_LEN]) -> String {
    let digest = blake3::hash(key);
    hex::encode(&digest.as_bytes()[..FINGERPRINT_LEN])
}

/// Fresh random key from the OS entropy source.
pub fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Mesh-wide group key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct GroupKey([u8; KEY_LEN]);

impl GroupKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Random key.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Short identifier for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl std::fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GroupKey({})", self.fingerprint())
    }
}

/// Pre-shared single-use secret protecting one key share.
///
/// Consumed by value; the bytes are wiped when it goes out of scope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TemporaryKey([u8; KEY_LEN]);

impl TemporaryKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for TemporaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TemporaryKey(..)")
    }
}
