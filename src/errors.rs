use thiserror::Error;

/// All errors that can occur in seedvault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Vault errors ---
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid vault state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Wrong password and tampered data are reported identically.
    #[error("Authentication failed — wrong password or corrupted data")]
    AuthenticationFailed,

    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(String),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl VaultError {
    /// Wrap a backend failure as a `Store` error.
    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        VaultError::Store(format!("{context}: {err}"))
    }

    /// Whether the caller may reasonably retry the operation.
    ///
    /// Only storage failures qualify; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::Store(_))
    }
}

/// Convenience type alias for seedvault results.
pub type Result<T> = std::result::Result<T, VaultError>;
