//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::Settings;
use crate::errors::{Result, VaultError};
use crate::vault::{PrepareParams, VaultFactory};

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Word counts a BIP-39 mnemonic can have.
const MNEMONIC_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// seedvault CLI: password-protected wallet seed vault.
#[derive(Parser)]
#[command(
    name = "seedvault",
    about = "Password-protected wallet seed vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding seedvault.toml and vault data (default: current dir)
    #[arg(long, global = true)]
    pub dir: Option<String>,

    /// Storage backend, overrides seedvault.toml (memory, file, sqlite)
    #[arg(long, global = true)]
    pub backend: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Store a new seed phrase in a fresh vault
    Create {
        /// Vault id (a UUID is generated if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Display name kept as readable metadata
        #[arg(long)]
        name: Option<String>,
    },

    /// List all vaults
    List,

    /// Show a vault's metadata (no password needed)
    Meta {
        /// Vault id
        id: String,
    },

    /// Decrypt and print a vault's seed phrase
    Reveal {
        /// Vault id
        id: String,
    },

    /// Change a vault's password (re-encrypts with a fresh salt)
    Rekey {
        /// Vault id
        id: String,
    },

    /// Delete a vault
    Delete {
        /// Vault id
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Payload stored inside a vault by the CLI.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SeedPayload {
    pub mnemonic: String,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Directory the CLI works in: `--dir` or the current directory.
pub fn base_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Settings from `seedvault.toml`, with CLI overrides applied.
pub fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(&base_dir(cli)?)?;
    if let Some(backend) = &cli.backend {
        settings.backend = backend.parse()?;
    }
    Ok(settings)
}

/// Prepare the global factory from the CLI configuration.
pub async fn factory(cli: &Cli) -> Result<&'static VaultFactory> {
    let params = PrepareParams::from_settings(&settings(cli)?, &base_dir(cli)?)?;
    let factory = VaultFactory::global();
    factory.prepare(params).await?;
    Ok(factory)
}

/// Get the vault password, trying in order:
/// 1. `SEEDVAULT_PASSWORD` env var (scripts/CI)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = env_secret("SEEDVAULT_PASSWORD") {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault password")
        .interact()
        .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// `env_var` lets scripts supply it non-interactively.
/// Enforces a minimum password length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_secret(env_var) {
        if pw.len() < MIN_PASSWORD_LEN {
            return Err(VaultError::CommandFailed(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault password")
            .with_confirmation(
                "Confirm vault password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Read the seed phrase from `SEEDVAULT_MNEMONIC` or a hidden prompt.
pub fn prompt_mnemonic() -> Result<Zeroizing<String>> {
    let raw = match env_secret("SEEDVAULT_MNEMONIC") {
        Some(m) => m,
        None => Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Enter seed phrase")
                .interact()
                .map_err(|e| VaultError::CommandFailed(format!("seed prompt: {e}")))?,
        ),
    };
    normalize_mnemonic(&raw)
}

/// Collapse whitespace and check the word count.
pub fn normalize_mnemonic(raw: &str) -> Result<Zeroizing<String>> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if !MNEMONIC_WORD_COUNTS.contains(&words.len()) {
        return Err(VaultError::CommandFailed(format!(
            "seed phrase must have 12, 15, 18, 21 or 24 words (got {})",
            words.len()
        )));
    }
    Ok(Zeroizing::new(words.join(" ")))
}

fn env_secret(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(Zeroizing::new)
}
