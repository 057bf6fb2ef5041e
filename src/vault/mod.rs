//! Vault module: password-gated encrypted payloads.
//!
//! This module provides:
//! - The plaintext key-store record and metadata types (`record`)
//! - The per-id `Vault` state machine (`instance`)
//! - The process-wide `VaultFactory` (`factory`)

pub mod factory;
pub mod instance;
pub mod record;

// Re-export the most commonly used items.
pub use factory::{PrepareParams, VaultFactory};
pub use instance::{Vault, VaultState};
pub use record::{KeyRecord, Metadata};

use crate::errors::{Result, VaultError};

/// Longest accepted vault id, in bytes.
const MAX_ID_LEN: usize = 256;

/// Validate that a vault id is usable as a store key.
///
/// Ids are opaque, but must be non-empty, at most 256 bytes and free of
/// control characters.
pub fn validate_vault_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(VaultError::InvalidParams("vault id cannot be empty".into()));
    }
    if id.len() > MAX_ID_LEN {
        return Err(VaultError::InvalidParams(format!(
            "vault id cannot exceed {MAX_ID_LEN} bytes"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(VaultError::InvalidParams(
            "vault id cannot contain control characters".into(),
        ));
    }
    Ok(())
}
