//! The derived vault key and the sub-key expanded from it.
//!
//! Argon2id output is never used directly as a cipher key.  HKDF-SHA256
//! (RFC 5869) expands it into the AES-256-GCM envelope key, so the KDF
//! output and the cipher key are independent values.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Result, VaultError};

/// Length of derived keys (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF context for the envelope encryption key.
const ENVELOPE_KEY_INFO: &[u8] = b"seedvault-envelope-key";

/// A 32-byte key derived from the vault password.
///
/// Lives only in memory and zeroes itself when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Create a `DerivedKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    /// Expand the AES-256-GCM key used to seal envelopes.
    pub fn envelope_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        // `salt` is None: the IKM already has full entropy from Argon2id.
        let hk = Hkdf::<Sha256>::new(None, &self.bytes);

        let mut okm = Zeroizing::new([0u8; KEY_LEN]);
        hk.expand(ENVELOPE_KEY_INFO, okm.as_mut_slice())
            .map_err(|e| VaultError::InvalidState(format!("HKDF expand failed: {e}")))?;

        Ok(okm)
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}
