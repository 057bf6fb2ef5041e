//! SQLite-backed store.
//!
//! Each logical store is one table in a shared database file.  rusqlite is
//! blocking, so every call runs on tokio's blocking pool behind a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::KvStore;
use crate::errors::{Result, VaultError};

/// Table holding key records.
pub const KEY_TABLE: &str = "key_store";

/// Table holding sealed envelopes.
pub const VAULT_TABLE: &str = "vault_store";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and use `table`.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let conn = open_connection(path)?;
        Self::with_connection(Arc::new(Mutex::new(conn)), table)
    }

    /// Key store and vault store sharing one database file.
    pub fn open_pair(path: &Path) -> Result<(Self, Self)> {
        let conn = Arc::new(Mutex::new(open_connection(path)?));
        Ok((
            Self::with_connection(Arc::clone(&conn), KEY_TABLE)?,
            Self::with_connection(conn, VAULT_TABLE)?,
        ))
    }

    /// A private in-memory database, for tests.
    pub fn in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| VaultError::store("sqlite open", e))?;
        Self::with_connection(Arc::new(Mutex::new(conn)), table)
    }

    fn with_connection(conn: Arc<Mutex<Connection>>, table: &str) -> Result<Self> {
        // Table names cannot be bound as parameters.
        if table.is_empty() || !table.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
            return Err(VaultError::InvalidParams(format!(
                "invalid table name '{table}'"
            )));
        }
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| VaultError::Store("sqlite connection poisoned".into()))?;
            f(&guard, &table).map_err(|e| VaultError::store(op, e))
        })
        .await
        .map_err(|e| VaultError::store(op, e))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultError::store("sqlite dir", e))?;
    }
    let conn = Connection::open(path).map_err(|e| VaultError::store("sqlite open", e))?;

    // Set restrictive permissions on the database (owner-only).
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| VaultError::store("sqlite chmod", e))?;
    }

    Ok(conn)
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        self.run("sqlite init", |conn, table| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id    TEXT PRIMARY KEY NOT NULL,
                    value BLOB NOT NULL
                );"
            ))
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let id = id.to_string();
        self.run("sqlite get", move |conn, table| {
            conn.query_row(
                &format!("SELECT value FROM {table} WHERE id = ?1"),
                [&id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, id: &str, value: &[u8]) -> Result<()> {
        let id = id.to_string();
        let value = value.to_vec();
        self.run("sqlite set", move |conn, table| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (id, value) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET value = excluded.value"
                ),
                rusqlite::params![id, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run("sqlite delete", move |conn, table| {
            conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [&id])
                .map(|_| ())
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.run("sqlite keys", |conn, table| {
            let mut stmt = conn.prepare(&format!("SELECT id FROM {table} ORDER BY id"))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }
}
