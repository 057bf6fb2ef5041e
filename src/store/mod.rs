//! Key-value storage behind the vault.
//!
//! A vault is persisted in two logical stores:
//! - the **key store**: salt, Argon2 params and plaintext metadata
//! - the **vault store**: the sealed envelope
//!
//! Both are plain `id -> bytes` maps behind the [`KvStore`] trait, so the
//! same vault logic runs on top of memory, a directory of files or SQLite.
//! Stores do no locking per id; callers serialize writes to one id.

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteStore;

/// Minimal async `id -> bytes` map.
#[async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Prepare the backing storage (directories, tables).  Idempotent.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, id: &str, value: &[u8]) -> Result<()>;

    /// Remove `id`.  Removing an absent id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

/// Which of the two logical stores an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    KeyStore,
    VaultStore,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::KeyStore => f.write_str("key store"),
            StoreKind::VaultStore => f.write_str("vault store"),
        }
    }
}

/// The pair of stores a factory works with.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct Stores {
    key_store: Arc<dyn KvStore>,
    vault_store: Arc<dyn KvStore>,
}

impl Stores {
    pub fn new(key_store: Arc<dyn KvStore>, vault_store: Arc<dyn KvStore>) -> Self {
        Self {
            key_store,
            vault_store,
        }
    }

    /// Two independent in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Build the stores for `backend` rooted at `data_dir`.
    pub fn open(backend: Backend, data_dir: &Path) -> Result<Self> {
        match backend {
            Backend::Memory => Ok(Self::in_memory()),
            Backend::File => Ok(Self::new(
                Arc::new(FileStore::new(data_dir.join("keys"))),
                Arc::new(FileStore::new(data_dir.join("vaults"))),
            )),
            #[cfg(feature = "sqlite-store")]
            Backend::Sqlite => {
                let (keys, vaults) = SqliteStore::open_pair(&data_dir.join("seedvault.db"))?;
                Ok(Self::new(Arc::new(keys), Arc::new(vaults)))
            }
            #[cfg(not(feature = "sqlite-store"))]
            Backend::Sqlite => Err(VaultError::Config(
                "sqlite backend requires the `sqlite-store` feature".into(),
            )),
        }
    }

    /// Split into `(key_store, vault_store)`.
    pub fn into_parts(self) -> (Arc<dyn KvStore>, Arc<dyn KvStore>) {
        (self.key_store, self.vault_store)
    }

    fn backend(&self, kind: StoreKind) -> &dyn KvStore {
        match kind {
            StoreKind::KeyStore => self.key_store.as_ref(),
            StoreKind::VaultStore => self.vault_store.as_ref(),
        }
    }

    /// Initialize both stores.
    pub async fn init(&self) -> Result<()> {
        self.key_store.init().await?;
        self.vault_store.init().await
    }

    pub async fn get(&self, kind: StoreKind, id: &str) -> Result<Option<Vec<u8>>> {
        self.backend(kind).get(id).await
    }

    pub async fn set(&self, kind: StoreKind, id: &str, value: &[u8]) -> Result<()> {
        self.backend(kind).set(id, value).await
    }

    pub async fn delete(&self, kind: StoreKind, id: &str) -> Result<()> {
        self.backend(kind).delete(id).await
    }

    pub async fn keys(&self, kind: StoreKind) -> Result<Vec<String>> {
        self.backend(kind).keys().await
    }
}

/// Persistence backend selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    File,
    #[default]
    Sqlite,
}

impl std::str::FromStr for Backend {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "file" => Ok(Backend::File),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(VaultError::Config(format!(
                "unknown backend '{other}' (expected memory, file or sqlite)"
            ))),
        }
    }
}
