//! Cryptographic primitives for seedvault.
//!
//! This module provides:
//! - The injectable RNG / KDF source (`provider`)
//! - Argon2id password-based key derivation (`kdf`)
//! - The zeroizing derived key and its HKDF sub-key (`keys`)
//! - AES-256-GCM envelopes with detached tags (`envelope`)

pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod provider;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, derive, ArgonParams, ...};
pub use envelope::{open, seal, Envelope, EnvelopeContext};
pub use kdf::{derive, generate_salt, ArgonParams, SALT_LEN};
pub use keys::DerivedKey;
pub use provider::{CryptoProvider, OsCrypto, SeededCrypto};
