use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::ArgonParams;
use crate::errors::{Result, VaultError};
use crate::store::Backend;

/// Vault configuration, loaded from `seedvault.toml`.
///
/// Every field has a sensible default so seedvault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where vaults are persisted: `memory`, `file` or `sqlite`.
    #[serde(default)]
    pub backend: Backend,

    /// Directory (relative to the config directory) holding vault data.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    ".seedvault".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    ArgonParams::default().memory_kib
}

fn default_argon2_iterations() -> u32 {
    ArgonParams::default().iterations
}

fn default_argon2_parallelism() -> u32 {
    ArgonParams::default().parallelism
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for.
    pub const FILE_NAME: &'static str = "seedvault.toml";

    /// Load settings from `<dir>/seedvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Resolve the data directory against `base_dir`.
    pub fn data_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.data_dir)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon_params(&self) -> ArgonParams {
        ArgonParams {
            parallelism: self.argon2_parallelism,
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
