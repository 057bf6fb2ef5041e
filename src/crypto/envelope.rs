//! AES-256-GCM envelopes.
//!
//! Each call to `seal` draws a fresh random 12-byte nonce from the crypto
//! provider.  The tag is kept detached so the envelope carries every
//! piece explicitly.  The associated data binds the ciphertext to the
//! vault id, salt and Argon2 params; tampering with any of them fails
//! the tag check exactly like a wrong password does.
//!
//! Layout of the vault-store blob:
//!
//! ```text
//! [SVLT: 4 bytes][version: 1 byte][nonce: 12 bytes][ciphertext][tag: 16 bytes]
//! ```
//!
//! Salt and params live in the key-store record, not in this blob.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use zeroize::Zeroizing;

use super::kdf::ArgonParams;
use super::keys::DerivedKey;
use super::provider::CryptoProvider;
use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Magic bytes at the start of every stored envelope.
const MAGIC: &[u8; 4] = b"SVLT";

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// Domain separator for the associated data.
const AAD_DOMAIN: &[u8] = b"seedvault-envelope-v1";

/// Everything the envelope is cryptographically bound to besides the key.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeContext<'a> {
    pub vault_id: &'a str,
    pub salt: &'a [u8],
    pub argon_params: ArgonParams,
}

impl EnvelopeContext<'_> {
    fn associated_data(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(AAD_DOMAIN.len() + self.vault_id.len() + 64);
        aad.extend_from_slice(AAD_DOMAIN);
        aad.extend_from_slice(&(self.vault_id.len() as u64).to_le_bytes());
        aad.extend_from_slice(self.vault_id.as_bytes());
        aad.extend_from_slice(&(self.salt.len() as u64).to_le_bytes());
        aad.extend_from_slice(self.salt);
        aad.extend_from_slice(&self.argon_params.parallelism.to_le_bytes());
        aad.extend_from_slice(&self.argon_params.memory_kib.to_le_bytes());
        aad.extend_from_slice(&self.argon_params.iterations.to_le_bytes());
        aad
    }
}

/// A sealed payload with everything needed to open it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_LEN],
    pub salt: Vec<u8>,
    pub argon_params: ArgonParams,
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Serialize the vault-store part (nonce, ciphertext, tag).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PREFIX_LEN + NONCE_LEN + self.ciphertext.len() + TAG_LEN);
        buf.extend_from_slice(MAGIC);
        buf.push(ENVELOPE_VERSION);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        buf.extend_from_slice(&self.tag);
        buf
    }

    /// Rebuild an envelope from a vault-store blob plus the salt and
    /// params kept in the key store.
    ///
    /// A malformed blob is reported as `AuthenticationFailed`, the same as
    /// a bad tag.
    pub fn from_stored(bytes: &[u8], salt: &[u8], argon_params: ArgonParams) -> Result<Self> {
        if bytes.len() < PREFIX_LEN + NONCE_LEN + TAG_LEN
            || &bytes[..4] != MAGIC
            || bytes[4] != ENVELOPE_VERSION
        {
            return Err(VaultError::AuthenticationFailed);
        }

        let body = &bytes[PREFIX_LEN..];
        let (nonce_bytes, rest) = body.split_at(NONCE_LEN);
        let (ciphertext, tag_bytes) = rest.split_at(rest.len() - TAG_LEN);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(tag_bytes);

        Ok(Self {
            nonce,
            salt: salt.to_vec(),
            argon_params,
            ciphertext: ciphertext.to_vec(),
            tag,
        })
    }

    fn context<'a>(&'a self, vault_id: &'a str) -> EnvelopeContext<'a> {
        EnvelopeContext {
            vault_id,
            salt: &self.salt,
            argon_params: self.argon_params,
        }
    }
}

/// Encrypt `plaintext` under `key`, bound to `ctx`.
pub fn seal(
    key: &DerivedKey,
    ctx: &EnvelopeContext<'_>,
    plaintext: &[u8],
    provider: &dyn CryptoProvider,
) -> Result<Envelope> {
    let enc_key = key.envelope_key()?;
    let cipher = Aes256Gcm::new_from_slice(enc_key.as_slice())
        .map_err(|e| VaultError::InvalidState(format!("invalid key length: {e}")))?;

    let mut nonce = [0u8; NONCE_LEN];
    provider.fill_random(&mut nonce)?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &ctx.associated_data(), &mut buffer)
        .map_err(|e| VaultError::InvalidState(format!("encryption error: {e}")))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(Envelope {
        nonce,
        salt: ctx.salt.to_vec(),
        argon_params: ctx.argon_params,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Verify and decrypt an envelope sealed for `vault_id`.
///
/// Returns the single `AuthenticationFailed` for every failure so callers
/// cannot tell a wrong password from damaged data.
pub fn open(key: &DerivedKey, envelope: &Envelope, vault_id: &str) -> Result<Zeroizing<Vec<u8>>> {
    let enc_key = key.envelope_key()?;
    let cipher =
        Aes256Gcm::new_from_slice(enc_key.as_slice()).map_err(|_| VaultError::AuthenticationFailed)?;

    let mut buffer = Zeroizing::new(envelope.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.nonce),
            &envelope.context(vault_id).associated_data(),
            buffer.as_mut_slice(),
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| VaultError::AuthenticationFailed)?;

    Ok(buffer)
}
