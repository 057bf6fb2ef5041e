//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Parameters are stored next to the salt in the key
//! record so a vault reopened later derives the exact same key.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use super::keys::{DerivedKey, KEY_LEN};
use super::provider::CryptoProvider;
use crate::errors::{Result, VaultError};

/// Length of the per-vault salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Minimum number of passes over memory.
pub const MIN_ITERATIONS: u32 = 1;

/// Minimum number of lanes.
pub const MIN_PARALLELISM: u32 = 1;

/// Tunable Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgonParams {
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
}

impl Default for ArgonParams {
    fn default() -> Self {
        Self {
            parallelism: 4,
            memory_kib: 65_536,
            iterations: 3,
        }
    }
}

impl ArgonParams {
    /// The weakest parameters `derive` accepts.
    pub fn minimum() -> Self {
        Self {
            parallelism: MIN_PARALLELISM,
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
        }
    }

    /// Reject parameters too weak to resist offline attack, or ones
    /// Argon2 itself cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(VaultError::InvalidParams(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(VaultError::InvalidParams(format!(
                "Argon2 iterations must be at least {MIN_ITERATIONS}"
            )));
        }
        if self.parallelism < MIN_PARALLELISM {
            return Err(VaultError::InvalidParams(format!(
                "Argon2 parallelism must be at least {MIN_PARALLELISM}"
            )));
        }
        self.to_argon2().map(|_| ())
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::InvalidParams(format!("invalid Argon2 params: {e}")))
    }
}

/// Derive a 32-byte key with explicit Argon2id parameters.
///
/// The same password + salt + params will always produce the same key.
/// Runs synchronously; async callers go through
/// [`CryptoProvider::derive_key`].
pub fn derive(password: &[u8], salt: &[u8], params: &ArgonParams) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(VaultError::InvalidParams("password cannot be empty".into()));
    }
    if salt.len() != SALT_LEN {
        return Err(VaultError::InvalidParams(format!(
            "salt must be {SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }
    params.validate()?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key = DerivedKey::zeroed();
    argon2
        .hash_password_into(password, salt, key.as_mut_bytes())
        .map_err(|e| VaultError::InvalidParams(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Draw a fresh random salt from the provider.
pub fn generate_salt(provider: &dyn CryptoProvider) -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    provider.fill_random(&mut salt)?;
    Ok(salt)
}
