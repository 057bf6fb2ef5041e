//! Integration tests for the vault state machine.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use seedvault::crypto::ArgonParams;
use seedvault::store::{KvStore, MemoryStore};
use seedvault::vault::KeyRecord;
use seedvault::{PrepareParams, Result, VaultError, VaultFactory, VaultState};

const PASSWORD: &[u8] = b"correct horse battery staple";
const MNEMONIC: &str = "all all all all all all all all all all all all";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Seed {
    mnemonic: String,
}

/// A memory store whose next `set` can be made to fail.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_next_set: AtomicBool,
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, value: &[u8]) -> Result<()> {
        if self.fail_next_set.swap(false, Ordering::SeqCst) {
            return Err(VaultError::Store("transient".into()));
        }
        self.inner.set(id, value).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }
}

/// Captures formatted log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Helper: a factory over fresh in-memory stores, with cheap Argon2 params.
async fn factory() -> (VaultFactory, Arc<MemoryStore>, Arc<MemoryStore>) {
    let key_store = Arc::new(MemoryStore::new());
    let vault_store = Arc::new(MemoryStore::new());
    let factory = VaultFactory::new();
    factory
        .prepare(
            PrepareParams::default()
                .with_stores(key_store.clone(), vault_store.clone())
                .with_argon_params(ArgonParams::minimum()),
        )
        .await
        .expect("prepare");
    (factory, key_store, vault_store)
}

// ---------------------------------------------------------------------------
// Save and load round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mnemonic_survives_save_and_reopen() {
    let (factory, _, _) = factory().await;

    let mut vault = factory.open(Some("wallet-1")).await.unwrap();
    assert_eq!(vault.state(), VaultState::Created);
    vault
        .set_password(PASSWORD)
        .await
        .unwrap()
        .save_json(&Seed {
            mnemonic: MNEMONIC.into(),
        })
        .await
        .unwrap();
    assert_eq!(vault.state(), VaultState::Saved);
    drop(vault);

    // Re-open with the same password.
    let mut reopened = factory.open(Some("wallet-1")).await.unwrap();
    let seed: Seed = reopened
        .set_password(PASSWORD)
        .await
        .unwrap()
        .load_json()
        .await
        .unwrap();
    assert_eq!(seed.mnemonic, MNEMONIC);
    assert_eq!(reopened.state(), VaultState::Loaded);
}

#[tokio::test]
async fn raw_bytes_roundtrip_through_callbacks() {
    let (factory, _, _) = factory().await;
    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 0]).collect();

    let mut vault = factory.open(None).await.unwrap();
    let id = vault.id().to_string();
    let to_save = payload.clone();
    vault
        .set_password(PASSWORD)
        .await
        .unwrap()
        .save(|| async move { Ok::<_, VaultError>(to_save) })
        .await
        .unwrap();

    let mut loaded = None;
    factory
        .open(Some(&id))
        .await
        .unwrap()
        .set_password(PASSWORD)
        .await
        .unwrap()
        .load(|bytes| {
            loaded = Some(bytes.to_vec());
            async { Ok::<_, VaultError>(()) }
        })
        .await
        .unwrap();

    assert_eq!(loaded, Some(payload));
}

// ---------------------------------------------------------------------------
// Wrong password and tampering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_password_fails_without_calling_deserializer() {
    let (factory, _, _) = factory().await;

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut called = false;
    let mut other = factory.open(Some("w")).await.unwrap();
    other.set_password(b"Tr0ub4dor&3").await.unwrap();
    let result = other
        .load(|_| {
            called = true;
            async { Ok::<_, VaultError>(()) }
        })
        .await;

    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(!called, "no plaintext may reach the caller");
    assert_eq!(other.state(), VaultState::Unlocked);
}

#[tokio::test]
async fn tampered_envelope_fails_like_wrong_password() {
    let (factory, _, vault_store) = factory().await;

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut blob = vault_store.get("w").await.unwrap().unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0x01;
    vault_store.set("w", &blob).await.unwrap();

    let mut reopened = factory.open(Some("w")).await.unwrap();
    reopened.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        reopened.load_json::<Seed>().await,
        Err(VaultError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn malformed_envelope_is_logged_like_a_wrong_password() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (factory, _, vault_store) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut wrong = factory.open(Some("w")).await.unwrap();
    wrong.set_password(b"not the password").await.unwrap();
    assert!(matches!(
        wrong.load_json::<Seed>().await,
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(logs.contents().matches("vault authentication failed").count(), 1);

    vault_store.set("w", b"SVLT").await.unwrap();
    let mut truncated = factory.open(Some("w")).await.unwrap();
    truncated.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        truncated.load_json::<Seed>().await,
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(logs.contents().matches("vault authentication failed").count(), 2);
}

#[tokio::test]
async fn tampered_salt_in_key_record_fails_authentication() {
    let (factory, key_store, _) = factory().await;

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let raw = key_store.get("w").await.unwrap().unwrap();
    let mut record = KeyRecord::from_bytes(&raw).unwrap();
    record.salt[0] ^= 0xFF;
    key_store.set("w", &record.to_bytes().unwrap()).await.unwrap();

    let mut reopened = factory.open(Some("w")).await.unwrap();
    reopened.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        reopened.load_json::<Seed>().await,
        Err(VaultError::AuthenticationFailed)
    ));
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn load_and_save_require_password() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();

    let mut serializer_called = false;
    let result = vault
        .save(|| {
            serializer_called = true;
            async { Ok::<_, VaultError>(Vec::new()) }
        })
        .await;
    assert!(matches!(result, Err(VaultError::InvalidState(_))));
    assert!(!serializer_called);

    assert!(matches!(
        vault.load(|_| async { Ok::<_, VaultError>(()) }).await,
        Err(VaultError::InvalidState(_))
    ));
}

#[tokio::test]
async fn set_password_twice_requires_lock() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();

    vault.set_password(PASSWORD).await.unwrap();
    assert_eq!(vault.state(), VaultState::Unlocked);
    assert!(matches!(
        vault.set_password(PASSWORD).await,
        Err(VaultError::InvalidState(_))
    ));

    vault.lock();
    assert_eq!(vault.state(), VaultState::Created);
    vault.set_password(PASSWORD).await.unwrap();
}

#[tokio::test]
async fn locked_vault_cannot_load() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    vault.lock();
    assert!(matches!(
        vault.load_json::<Seed>().await,
        Err(VaultError::InvalidState(_))
    ));
}

#[tokio::test]
async fn empty_password_is_rejected() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    assert!(matches!(
        vault.set_password(b"").await,
        Err(VaultError::InvalidParams(_))
    ));
    assert_eq!(vault.state(), VaultState::Created);
}

#[tokio::test]
async fn never_saved_vault_is_not_found() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("fresh")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        vault.load_json::<Seed>().await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn failed_serializer_persists_nothing() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();

    let result = vault
        .save(|| async { Err::<Vec<u8>, _>(VaultError::Serialization("boom".into())) })
        .await;
    assert!(matches!(result, Err(VaultError::Serialization(_))));
    assert!(factory.list().await.unwrap().is_empty());
    assert_eq!(vault.state(), VaultState::Unlocked);
}

// ---------------------------------------------------------------------------
// Nonces, params, rekey
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_save_uses_a_fresh_nonce() {
    let (factory, _, vault_store) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();

    let mut nonces = HashSet::new();
    for _ in 0..16 {
        vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();
        let blob = vault_store.get("w").await.unwrap().unwrap();
        // Skip magic + version.
        nonces.insert(blob[5..17].to_vec());
    }
    assert_eq!(nonces.len(), 16);
}

#[tokio::test]
async fn weak_params_are_rejected() {
    let (factory, _, _) = factory().await;
    let weak = ArgonParams {
        iterations: 1,
        memory_kib: 8,
        parallelism: 1,
    };

    let mut vault = factory.open(Some("w")).await.unwrap();
    assert!(matches!(
        vault.set_argon_params(weak).await,
        Err(VaultError::InvalidParams(_))
    ));

    let other = VaultFactory::new();
    assert!(matches!(
        other
            .prepare(PrepareParams::default().with_argon_params(weak))
            .await,
        Err(VaultError::InvalidParams(_))
    ));
}

#[tokio::test]
async fn params_are_fixed_once_saved() {
    let (factory, _, _) = factory().await;
    let custom = ArgonParams {
        iterations: 2,
        ..ArgonParams::minimum()
    };

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_argon_params(custom).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut reopened = factory.open(Some("w")).await.unwrap();
    assert!(matches!(
        reopened.set_argon_params(ArgonParams::minimum()).await,
        Err(VaultError::InvalidState(_))
    ));
    reopened.set_password(PASSWORD).await.unwrap();
    assert_eq!(reopened.argon_params(), custom);
}

#[tokio::test]
async fn rekey_switches_password() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let stronger = ArgonParams {
        iterations: 2,
        ..ArgonParams::minimum()
    };
    vault.rekey(b"new password", Some(stronger)).await.unwrap();
    assert_eq!(vault.state(), VaultState::Saved);
    assert_eq!(vault.argon_params(), stronger);

    let mut old = factory.open(Some("w")).await.unwrap();
    old.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        old.load_json::<Seed>().await,
        Err(VaultError::AuthenticationFailed)
    ));

    let mut new = factory.open(Some("w")).await.unwrap();
    new.set_password(b"new password").await.unwrap();
    assert_eq!(new.load_json::<Seed>().await.unwrap().mnemonic, MNEMONIC);
}

#[tokio::test]
async fn failed_rekey_keeps_old_password_working() {
    let key_store = Arc::new(FlakyStore::default());
    let factory = VaultFactory::new();
    factory
        .prepare(
            PrepareParams::default()
                .with_stores(key_store.clone(), Arc::new(MemoryStore::new()))
                .with_argon_params(ArgonParams::minimum()),
        )
        .await
        .unwrap();

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    // The envelope write succeeds, the key record write does not.
    key_store.fail_next_set.store(true, Ordering::SeqCst);
    let result = vault.rekey(b"new password", None).await;
    assert!(matches!(result, Err(ref e) if e.is_retryable()));

    let mut old = factory.open(Some("w")).await.unwrap();
    old.set_password(PASSWORD).await.unwrap();
    assert_eq!(old.load_json::<Seed>().await.unwrap().mnemonic, MNEMONIC);

    // Retrying on the same instance finishes the job.
    vault.rekey(b"new password", None).await.unwrap();
    let mut new = factory.open(Some("w")).await.unwrap();
    new.set_password(b"new password").await.unwrap();
    assert_eq!(new.load_json::<Seed>().await.unwrap().mnemonic, MNEMONIC);
}

#[tokio::test]
async fn stale_instance_cannot_overwrite_rekeyed_vault() {
    let (factory, _, _) = factory().await;
    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut stale = factory.open(Some("w")).await.unwrap();
    stale.set_password(PASSWORD).await.unwrap();

    vault.rekey(b"new password", None).await.unwrap();

    assert!(matches!(
        stale.save_json(&Seed { mnemonic: "x".into() }).await,
        Err(VaultError::InvalidState(_))
    ));
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metadata_is_readable_without_password() {
    let (factory, _, _) = factory().await;

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_meta("name", "Main wallet").await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let meta = factory.meta("w").await.unwrap().expect("known vault");
    assert_eq!(meta["name"], "Main wallet");

    let reopened = factory.open(Some("w")).await.unwrap();
    assert_eq!(reopened.state(), VaultState::Created);
    assert_eq!(reopened.meta().await.unwrap()["name"], "Main wallet");

    assert!(factory.meta("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn metadata_writes_through_for_existing_vault() {
    let (factory, _, _) = factory().await;

    let mut vault = factory.open(Some("w")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();

    let mut locked = factory.open(Some("w")).await.unwrap();
    locked.set_meta("label", 7).await.unwrap();
    assert_eq!(factory.meta("w").await.unwrap().unwrap()["label"], 7);

    assert_eq!(
        locked.remove_meta("label").await.unwrap(),
        Some(serde_json::json!(7))
    );
    assert!(factory.meta("w").await.unwrap().unwrap().get("label").is_none());

    // The payload is untouched by metadata edits.
    let mut reader = factory.open(Some("w")).await.unwrap();
    reader.set_password(PASSWORD).await.unwrap();
    assert_eq!(reader.load_json::<Seed>().await.unwrap().mnemonic, MNEMONIC);
}

#[tokio::test]
async fn pending_metadata_is_not_listed_before_save() {
    let (factory, _, _) = factory().await;

    let mut vault = factory.open(Some("draft")).await.unwrap();
    vault.set_meta("name", "Draft").await.unwrap();
    assert_eq!(vault.meta().await.unwrap()["name"], "Draft");

    assert!(factory.list().await.unwrap().is_empty());
    assert!(factory.meta("draft").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_vault_everywhere() {
    let (factory, key_store, vault_store) = factory().await;

    let mut vault = factory.open(Some("gone")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    vault.save_json(&Seed { mnemonic: MNEMONIC.into() }).await.unwrap();
    assert_eq!(factory.list().await.unwrap(), vec!["gone"]);

    factory.delete("gone").await.unwrap();
    factory.delete("gone").await.unwrap();

    assert!(factory.list().await.unwrap().is_empty());
    assert!(key_store.get("gone").await.unwrap().is_none());
    assert!(vault_store.get("gone").await.unwrap().is_none());

    let mut reopened = factory.open(Some("gone")).await.unwrap();
    reopened.set_password(PASSWORD).await.unwrap();
    assert!(matches!(
        reopened.load_json::<Seed>().await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn vaults_with_different_ids_run_concurrently() {
    let (factory, _, _) = factory().await;

    let save = |id: &'static str, mnemonic: &'static str| {
        let factory = &factory;
        async move {
            let mut vault = factory.open(Some(id)).await?;
            vault.set_password(PASSWORD).await?;
            vault.save_json(&Seed { mnemonic: mnemonic.into() }).await?;
            Ok::<_, VaultError>(())
        }
    };

    let (a, b) = tokio::join!(save("a", "alpha"), save("b", "bravo"));
    a.unwrap();
    b.unwrap();

    assert_eq!(factory.list().await.unwrap(), vec!["a", "b"]);

    let mut vault = factory.open(Some("b")).await.unwrap();
    vault.set_password(PASSWORD).await.unwrap();
    assert_eq!(vault.load_json::<Seed>().await.unwrap().mnemonic, "bravo");
}
