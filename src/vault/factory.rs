//! Process-wide entry point to the vaults.
//!
//! `prepare` wires up the crypto provider and the two stores exactly once.
//! Every other operation waits on the same one-shot cell, so nothing can
//! touch a store before it is initialized, and concurrent `prepare` calls
//! share a single initialization.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::instance::Vault;
use super::record::{KeyRecord, Metadata};
use super::validate_vault_id;
use crate::config::Settings;
use crate::crypto::{ArgonParams, CryptoProvider, OsCrypto};
use crate::errors::{Result, VaultError};
use crate::store::{KvStore, MemoryStore, StoreKind, Stores};

/// Options for [`VaultFactory::prepare`].  Anything left `None` gets the
/// default: `OsCrypto`, in-memory stores, `ArgonParams::default()`.
#[derive(Debug, Default, Clone)]
pub struct PrepareParams {
    pub crypto: Option<Arc<dyn CryptoProvider>>,
    pub key_store: Option<Arc<dyn KvStore>>,
    pub vault_store: Option<Arc<dyn KvStore>>,
    /// Params for vaults created from now on.
    pub argon_params: Option<ArgonParams>,
}

impl PrepareParams {
    /// Stores and Argon2 params as configured in `settings`.
    ///
    /// A relative `data_dir` is resolved against `base_dir`.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> Result<Self> {
        let (key_store, vault_store) =
            Stores::open(settings.backend, &settings.data_path(base_dir))?.into_parts();
        Ok(Self {
            crypto: None,
            key_store: Some(key_store),
            vault_store: Some(vault_store),
            argon_params: Some(settings.argon_params()),
        })
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    pub fn with_stores(mut self, key_store: Arc<dyn KvStore>, vault_store: Arc<dyn KvStore>) -> Self {
        self.key_store = Some(key_store);
        self.vault_store = Some(vault_store);
        self
    }

    pub fn with_argon_params(mut self, params: ArgonParams) -> Self {
        self.argon_params = Some(params);
        self
    }

    /// Whether anything differs from the all-defaults setup.
    fn is_explicit(&self) -> bool {
        self.crypto.is_some()
            || self.key_store.is_some()
            || self.vault_store.is_some()
            || self.argon_params.is_some()
    }
}

/// Shared, read-only state every vault instance holds on to.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub(crate) stores: Stores,
    pub(crate) crypto: Arc<dyn CryptoProvider>,
    pub(crate) default_params: ArgonParams,
    /// Set up with defaults by an operation that ran before `prepare`.
    auto_prepared: bool,
}

#[derive(Debug, Default)]
pub struct VaultFactory {
    prepared: OnceCell<Arc<Prepared>>,
}

impl VaultFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide factory.
    pub fn global() -> &'static VaultFactory {
        static INSTANCE: OnceLock<VaultFactory> = OnceLock::new();
        INSTANCE.get_or_init(VaultFactory::new)
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.initialized()
    }

    /// Initialize stores and crypto.  Later calls are no-ops; concurrent
    /// calls wait for the one in flight.  A failed attempt leaves the
    /// factory unprepared so it can be retried.
    ///
    /// Fails with `InvalidState` when an earlier operation already prepared
    /// the factory with defaults and `params` asks for anything else.
    pub async fn prepare(&self, params: PrepareParams) -> Result<()> {
        let explicit = params.is_explicit();
        if self.is_prepared() {
            debug!("vault factory already prepared");
        }
        let prepared = self
            .prepared
            .get_or_try_init(|| initialize(params, false))
            .await?;
        if prepared.auto_prepared && explicit {
            warn!("prepare called after the vault factory was set up with defaults");
            return Err(VaultError::InvalidState(
                "vault factory was already prepared with defaults by an earlier operation; \
                 call prepare before using it"
                    .into(),
            ));
        }
        Ok(())
    }

    /// A new vault bound to `id`, or to a fresh UUID when `id` is `None`.
    ///
    /// Nothing is read from the stores until the vault is used.
    pub async fn open(&self, id: Option<&str>) -> Result<Vault> {
        let prepared = self.ready().await?;
        let id = match id {
            Some(id) => {
                validate_vault_id(id)?;
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        debug!(vault = %id, "vault opened");
        Ok(Vault::new(id, prepared))
    }

    /// Ids of every vault saved at least once.
    pub async fn list(&self) -> Result<Vec<String>> {
        let prepared = self.ready().await?;
        prepared.stores.keys(StoreKind::KeyStore).await
    }

    /// Metadata of `id` without a password, `None` if the vault is unknown.
    pub async fn meta(&self, id: &str) -> Result<Option<Metadata>> {
        let prepared = self.ready().await?;
        validate_vault_id(id)?;
        let Some(bytes) = prepared.stores.get(StoreKind::KeyStore, id).await? else {
            return Ok(None);
        };
        Ok(Some(KeyRecord::from_bytes(&bytes)?.metadata))
    }

    /// Remove everything persisted for `id`.  Unknown ids are fine.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let prepared = self.ready().await?;
        validate_vault_id(id)?;
        // Key record first so a half-finished delete is no longer listed.
        prepared.stores.delete(StoreKind::KeyStore, id).await?;
        prepared.stores.delete(StoreKind::VaultStore, id).await?;
        info!(vault = %id, "vault deleted");
        Ok(())
    }

    /// Wait for `prepare`, running it with defaults if nobody has.
    async fn ready(&self) -> Result<Arc<Prepared>> {
        self.prepared
            .get_or_try_init(|| initialize(PrepareParams::default(), true))
            .await
            .cloned()
    }
}

async fn initialize(params: PrepareParams, auto_prepared: bool) -> Result<Arc<Prepared>> {
    let default_params = params.argon_params.unwrap_or_default();
    default_params.validate()?;

    let stores = Stores::new(
        params
            .key_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new())),
        params
            .vault_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new())),
    );
    stores.init().await?;

    let crypto = params.crypto.unwrap_or_else(|| Arc::new(OsCrypto));

    info!(?default_params, auto_prepared, "vault factory prepared");
    Ok(Arc::new(Prepared {
        stores,
        crypto,
        default_params,
        auto_prepared,
    }))
}
