//! Injectable source of randomness and key derivation.
//!
//! The vault never touches an RNG or the Argon2 implementation directly;
//! it goes through a `CryptoProvider` handed to the factory at `prepare`
//! time.  `OsCrypto` is the production default.  Tests swap in a seeded
//! provider so runs are reproducible.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use zeroize::Zeroizing;

use super::kdf::{self, ArgonParams};
use super::keys::DerivedKey;
use crate::errors::{VaultError, Result};

/// Source of secure random bytes and (optionally) an accelerated KDF.
#[async_trait]
pub trait CryptoProvider: Send + Sync + fmt::Debug {
    /// Fill `dest` with cryptographically secure random bytes.
    fn fill_random(&self, dest: &mut [u8]) -> Result<()>;

    /// Run Argon2id for `password` + `salt`.
    ///
    /// The default runs the pure-Rust implementation on tokio's blocking
    /// pool so slow derivations do not stall other tasks.  Dropping the
    /// returned future abandons the result; nothing is persisted.
    async fn derive_key(
        &self,
        password: Zeroizing<Vec<u8>>,
        salt: Vec<u8>,
        params: ArgonParams,
    ) -> Result<DerivedKey> {
        tokio::task::spawn_blocking(move || kdf::derive(&password, &salt, &params))
            .await
            .map_err(|e| VaultError::InvalidState(format!("key derivation task failed: {e}")))?
    }
}

/// Operating-system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCrypto;

impl CryptoProvider for OsCrypto {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| VaultError::InvalidState(format!("OS random source failed: {e}")))
    }
}

/// Deterministic provider for tests and reproducible fixtures.
///
/// Never use this for real vaults: the same seed yields the same salts
/// and nonces.
pub struct SeededCrypto {
    rng: Mutex<StdRng>,
}

impl SeededCrypto {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededCrypto").finish_non_exhaustive()
    }
}

impl CryptoProvider for SeededCrypto {
    fn fill_random(&self, dest: &mut [u8]) -> Result<()> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| VaultError::InvalidState("seeded RNG poisoned".into()))?;
        rng.fill_bytes(dest);
        Ok(())
    }
}
