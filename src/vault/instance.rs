//! A single password-gated vault.
//!
//! `Vault` is handed out by [`VaultFactory::open`](super::VaultFactory::open)
//! in the `Created` state.  `set_password` derives the key and moves it to
//! `Unlocked`; `load` and `save` move it to `Loaded` / `Saved`.  The derived
//! key lives in the state itself, so leaving `Created` is the only way to
//! get one and `lock` (or dropping the vault) zeroes it.
//!
//! All operations take `&mut self`, so one instance never runs two of them
//! at the same time.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::factory::Prepared;
use super::record::{KeyRecord, Metadata};
use crate::crypto::envelope::{self, Envelope, EnvelopeContext};
use crate::crypto::{generate_salt, ArgonParams, DerivedKey};
use crate::errors::{Result, VaultError};
use crate::store::StoreKind;

/// Observable lifecycle state of a [`Vault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// Bound to an id, no password yet.
    Created,
    /// Key derived, nothing loaded or saved since.
    Unlocked,
    /// Payload decrypted and handed to the caller.
    Loaded,
    /// Payload sealed and persisted.
    Saved,
}

/// Key material for an unlocked vault.
struct Session {
    key: DerivedKey,
    salt: Vec<u8>,
    argon_params: ArgonParams,
    /// Whether a key record with this salt exists in the key store.
    persisted: bool,
}

enum State {
    Created,
    Unlocked(Session),
    Loaded(Session),
    Saved(Session),
}

impl State {
    fn session(&self) -> Option<&Session> {
        match self {
            State::Created => None,
            State::Unlocked(s) | State::Loaded(s) | State::Saved(s) => Some(s),
        }
    }

    fn session_mut(&mut self) -> Option<&mut Session> {
        match self {
            State::Created => None,
            State::Unlocked(s) | State::Loaded(s) | State::Saved(s) => Some(s),
        }
    }

    /// Move the current session into the state built by `next`.
    fn advance(&mut self, next: fn(Session) -> State) {
        *self = match std::mem::replace(self, State::Created) {
            State::Created => State::Created,
            State::Unlocked(s) | State::Loaded(s) | State::Saved(s) => next(s),
        };
    }
}

/// The main vault handle.
pub struct Vault {
    id: String,
    prepared: Arc<Prepared>,
    /// Params used when this vault is saved for the first time.
    argon_params: ArgonParams,
    /// Metadata set before the first save; written with the key record.
    pending_meta: Metadata,
    state: State,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Vault {
    pub(crate) fn new(id: String, prepared: Arc<Prepared>) -> Self {
        let argon_params = prepared.default_params;
        Self {
            id,
            prepared,
            argon_params,
            pending_meta: Metadata::new(),
            state: State::Created,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> VaultState {
        match self.state {
            State::Created => VaultState::Created,
            State::Unlocked(_) => VaultState::Unlocked,
            State::Loaded(_) => VaultState::Loaded,
            State::Saved(_) => VaultState::Saved,
        }
    }

    /// Argon2 params in effect: the persisted ones once unlocked, otherwise
    /// the ones a first save would use.
    pub fn argon_params(&self) -> ArgonParams {
        self.state
            .session()
            .map_or(self.argon_params, |s| s.argon_params)
    }

    /// Choose the Argon2 params for a vault that has never been saved.
    ///
    /// Params of an existing vault only change through [`Vault::rekey`].
    pub async fn set_argon_params(&mut self, params: ArgonParams) -> Result<&mut Self> {
        if !matches!(self.state, State::Created) {
            return Err(VaultError::InvalidState(
                "Argon2 params can only be chosen before the password is set".into(),
            ));
        }
        params.validate()?;
        if self.read_record().await?.is_some() {
            return Err(VaultError::InvalidState(format!(
                "vault '{}' already exists; use rekey to change its params",
                self.id
            )));
        }
        self.argon_params = params;
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Password handling
    // ------------------------------------------------------------------

    /// Derive the vault key from `password`.
    ///
    /// Uses the persisted salt and params when the vault exists, otherwise
    /// draws a fresh salt for the first save.
    pub async fn set_password(&mut self, password: &[u8]) -> Result<&mut Self> {
        if !matches!(self.state, State::Created) {
            return Err(VaultError::InvalidState(
                "password already set; lock the vault first".into(),
            ));
        }

        let (salt, argon_params, persisted) = match self.read_record().await? {
            Some(record) => (record.salt, record.argon_params, true),
            None => {
                let salt = generate_salt(self.prepared.crypto.as_ref())?;
                (salt.to_vec(), self.argon_params, false)
            }
        };

        let key = self.derive(password, &salt, argon_params).await?;
        debug!(vault = %self.id, persisted, "vault unlocked");

        self.state = State::Unlocked(Session {
            key,
            salt,
            argon_params,
            persisted,
        });
        Ok(self)
    }

    /// Forget the derived key.  The vault goes back to `Created`.
    pub fn lock(&mut self) -> &mut Self {
        // Dropping the session zeroes the key.
        self.state = State::Created;
        debug!(vault = %self.id, "vault locked");
        self
    }

    // ------------------------------------------------------------------
    // Payload
    // ------------------------------------------------------------------

    /// Decrypt the stored payload and pass it to `deserialize`.
    pub async fn load<F, Fut>(&mut self, deserialize: F) -> Result<&mut Self>
    where
        F: FnOnce(Zeroizing<Vec<u8>>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let session = self.session()?;
        if !session.persisted {
            return Err(VaultError::NotFound(format!("vault '{}'", self.id)));
        }

        let blob = self.read_envelope().await?;
        let plaintext = self.open_blob(session, &blob)?;
        deserialize(plaintext).await?;

        self.state.advance(State::Loaded);
        debug!(vault = %self.id, "vault loaded");
        Ok(self)
    }

    /// Seal the bytes produced by `serialize` and persist them.
    ///
    /// Overwrites any previous envelope with one under a fresh nonce.
    pub async fn save<F, Fut>(&mut self, serialize: F) -> Result<&mut Self>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        self.session()?;
        let plaintext = Zeroizing::new(serialize().await?);

        let session = self.session()?;
        let existing = self.read_record().await?;
        let mut record = match existing {
            Some(record) if record.salt != session.salt => {
                return Err(VaultError::InvalidState(format!(
                    "key record of vault '{}' changed since the password was set",
                    self.id
                )));
            }
            Some(record) => record,
            None => KeyRecord::new(session.salt.clone(), session.argon_params),
        };
        record.metadata.extend(self.pending_meta.clone());
        record.touch();

        let ctx = EnvelopeContext {
            vault_id: &self.id,
            salt: &session.salt,
            argon_params: session.argon_params,
        };
        let sealed = envelope::seal(&session.key, &ctx, &plaintext, self.prepared.crypto.as_ref())?;

        // Envelope first: a record without an envelope would list a vault
        // that cannot be loaded.
        let stores = &self.prepared.stores;
        stores
            .set(StoreKind::VaultStore, &self.id, &sealed.to_bytes())
            .await?;
        stores
            .set(StoreKind::KeyStore, &self.id, &record.to_bytes()?)
            .await?;

        self.pending_meta.clear();
        if let Some(session) = self.state.session_mut() {
            session.persisted = true;
        }
        self.state.advance(State::Saved);
        info!(vault = %self.id, "vault saved");
        Ok(self)
    }

    /// Load the payload as JSON.
    pub async fn load_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mut out = None;
        self.load(|bytes| {
            let parsed = serde_json::from_slice::<T>(&bytes)
                .map(|value| out = Some(value))
                .map_err(|e| VaultError::Serialization(format!("payload: {e}")));
            std::future::ready(parsed)
        })
        .await?;
        out.ok_or_else(|| VaultError::Serialization("payload was not deserialized".into()))
    }

    /// Save `value` as the JSON payload.
    pub async fn save_json<T: Serialize>(&mut self, value: &T) -> Result<&mut Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| VaultError::Serialization(format!("payload: {e}")))?;
        self.save(move || std::future::ready(Ok(bytes))).await
    }

    /// Re-encrypt the vault under `new_password`, a fresh salt and
    /// optionally new Argon2 params.
    pub async fn rekey(
        &mut self,
        new_password: &[u8],
        argon_params: Option<ArgonParams>,
    ) -> Result<&mut Self> {
        let session = self.session()?;
        if !session.persisted {
            return Err(VaultError::NotFound(format!("vault '{}'", self.id)));
        }
        let argon_params = argon_params.unwrap_or(session.argon_params);
        argon_params.validate()?;

        let previous = self.read_envelope().await?;
        let plaintext = self.open_blob(session, &previous)?;
        let mut record = self
            .read_record()
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("vault '{}'", self.id)))?;

        let salt = generate_salt(self.prepared.crypto.as_ref())?.to_vec();
        let key = self.derive(new_password, &salt, argon_params).await?;

        let ctx = EnvelopeContext {
            vault_id: &self.id,
            salt: &salt,
            argon_params,
        };
        let sealed = envelope::seal(&key, &ctx, &plaintext, self.prepared.crypto.as_ref())?;

        record.salt = salt.clone();
        record.argon_params = argon_params;
        record.metadata.extend(self.pending_meta.clone());
        record.touch();

        let record_bytes = record.to_bytes()?;
        let stores = &self.prepared.stores;
        stores
            .set(StoreKind::VaultStore, &self.id, &sealed.to_bytes())
            .await?;
        // The new envelope only opens with the new salt.  If the record
        // cannot follow, put the old envelope back so the old password
        // keeps working.
        if let Err(e) = stores.set(StoreKind::KeyStore, &self.id, &record_bytes).await {
            warn!(vault = %self.id, error = %e, "key record write failed during rekey");
            if let Err(restore) = stores.set(StoreKind::VaultStore, &self.id, &previous).await {
                warn!(vault = %self.id, error = %restore, "could not restore previous envelope");
            }
            return Err(e);
        }

        self.pending_meta.clear();
        self.argon_params = argon_params;
        self.state = State::Saved(Session {
            key,
            salt,
            argon_params,
            persisted: true,
        });
        info!(vault = %self.id, "vault re-keyed");
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Metadata (no password needed)
    // ------------------------------------------------------------------

    /// Stored metadata plus anything set but not yet saved.
    pub async fn meta(&self) -> Result<Metadata> {
        let mut meta = match self.read_record().await? {
            Some(record) => record.metadata,
            None => Metadata::new(),
        };
        meta.extend(self.pending_meta.clone());
        Ok(meta)
    }

    /// Set one metadata entry.
    ///
    /// Written through immediately for an existing vault, otherwise kept
    /// until the first save.
    pub async fn set_meta(
        &mut self,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<&mut Self> {
        let value = value.into();
        match self.read_record().await? {
            Some(mut record) => {
                record.metadata.insert(key.to_string(), value);
                record.touch();
                self.write_record(&record).await?;
            }
            None => {
                self.pending_meta.insert(key.to_string(), value);
            }
        }
        Ok(self)
    }

    /// Remove one metadata entry, returning its previous value.
    pub async fn remove_meta(&mut self, key: &str) -> Result<Option<serde_json::Value>> {
        let pending = self.pending_meta.remove(key);
        match self.read_record().await? {
            Some(mut record) => {
                let Some(stored) = record.metadata.remove(key) else {
                    return Ok(pending);
                };
                record.touch();
                self.write_record(&record).await?;
                Ok(Some(stored))
            }
            None => Ok(pending),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn session(&self) -> Result<&Session> {
        self.state.session().ok_or_else(|| {
            VaultError::InvalidState(format!("vault '{}' is locked; set a password first", self.id))
        })
    }

    async fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        argon_params: ArgonParams,
    ) -> Result<DerivedKey> {
        if password.is_empty() {
            return Err(VaultError::InvalidParams("password cannot be empty".into()));
        }
        argon_params.validate()?;
        self.prepared
            .crypto
            .derive_key(
                Zeroizing::new(password.to_vec()),
                salt.to_vec(),
                argon_params,
            )
            .await
    }

    async fn read_record(&self) -> Result<Option<KeyRecord>> {
        self.prepared
            .stores
            .get(StoreKind::KeyStore, &self.id)
            .await?
            .map(|bytes| KeyRecord::from_bytes(&bytes))
            .transpose()
    }

    async fn write_record(&self, record: &KeyRecord) -> Result<()> {
        self.prepared
            .stores
            .set(StoreKind::KeyStore, &self.id, &record.to_bytes()?)
            .await
    }

    async fn read_envelope(&self) -> Result<Vec<u8>> {
        self.prepared
            .stores
            .get(StoreKind::VaultStore, &self.id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("vault '{}'", self.id)))
    }

    /// Open a stored envelope with `session`'s key.
    fn open_blob(&self, session: &Session, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        Envelope::from_stored(blob, &session.salt, session.argon_params)
            .and_then(|sealed| envelope::open(&session.key, &sealed, &self.id))
            .map_err(|e| {
                warn!(vault = %self.id, "vault authentication failed");
                e
            })
    }
}
