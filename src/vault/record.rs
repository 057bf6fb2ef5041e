//! Key-store record: everything about a vault that is not secret.
//!
//! Stored as JSON under the vault id in the key store:
//!
//! ```text
//! { "version": 1, "salt": "<base64>", "argon_params": {..},
//!   "metadata": {..}, "created_at": "..", "updated_at": ".." }
//! ```
//!
//! The salt and params are what a later `set_password` needs to derive the
//! same key again; the metadata is readable without any password.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::ArgonParams;
use crate::errors::{Result, VaultError};

/// Current key record version.
pub const RECORD_VERSION: u8 = 1;

/// Plaintext labels attached to a vault (display name, creation time, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Format version.
    pub version: u8,

    /// The salt used for Argon2id key derivation (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Argon2 params the vault key was derived with.
    pub argon_params: ArgonParams,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl KeyRecord {
    pub fn new(salt: Vec<u8>, argon_params: ArgonParams) -> Self {
        let now = Utc::now();
        Self {
            version: RECORD_VERSION,
            salt,
            argon_params,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VaultError::Serialization(format!("key record: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: KeyRecord = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::Store(format!("malformed key record: {e}")))?;

        if record.version != RECORD_VERSION {
            return Err(VaultError::Store(format!(
                "unsupported key record version {}, expected {RECORD_VERSION}",
                record.version
            )));
        }

        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
