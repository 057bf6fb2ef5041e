//! Password-protected seed vault.
//!
//! A vault's payload is sealed with AES-256-GCM under a key derived from
//! the user's password with Argon2id.  The salt, Argon2 params and plaintext
//! metadata go to a "key store"; the sealed envelope goes to a separate
//! "vault store".  Both stores are pluggable (`store`).
//!
//! ```no_run
//! # async fn demo() -> seedvault::errors::Result<()> {
//! use seedvault::vault::{PrepareParams, VaultFactory};
//!
//! let factory = VaultFactory::global();
//! factory.prepare(PrepareParams::default()).await?;
//!
//! let mut vault = factory.open(None).await?;
//! vault
//!     .set_password(b"correct horse battery staple")
//!     .await?
//!     .save(|| async { Ok::<_, seedvault::VaultError>(b"seed material".to_vec()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod store;
pub mod vault;

pub use errors::{Result, VaultError};
pub use vault::{PrepareParams, Vault, VaultFactory, VaultState};
