//! Directory-backed store: one file per id.
//!
//! File names are the URL-safe base64 of the id, so any id string maps to
//! a safe name.  Writes go to a temp file in the same directory and are
//! then renamed over the target, so readers never see a half-written
//! entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::KvStore;
use crate::errors::{Result, VaultError};

/// Extension of committed entries.
const ENTRY_EXT: &str = "bin";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{ENTRY_EXT}", URL_SAFE_NO_PAD.encode(id)))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| VaultError::store(&format!("create {}", self.dir.display()), e))
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.entry_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::store("read entry", e)),
        }
    }

    async fn set(&self, id: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(id);
        let tmp_path = self.dir.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        tokio::fs::write(&tmp_path, value)
            .await
            .map_err(|e| VaultError::store("write entry", e))?;

        // Owner-only, the salt and envelope are nobody else's business.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(|e| VaultError::store("chmod entry", e))?;
        }

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| VaultError::store("commit entry", e))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::store("delete entry", e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::store("list entries", e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VaultError::store("list entries", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&format!(".{ENTRY_EXT}")) else {
                continue;
            };
            // Skip stray files that are not ours.
            let Ok(raw) = URL_SAFE_NO_PAD.decode(stem) else {
                continue;
            };
            if let Ok(id) = String::from_utf8(raw) {
                keys.push(id);
            }
        }

        keys.sort();
        Ok(keys)
    }
}
