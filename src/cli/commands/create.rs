//! `seedvault create`: store a seed phrase in a new vault.
//!
//! Prompts for the seed phrase and a new password, seals the phrase
//! and records the display name and creation time as metadata.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{factory, prompt_mnemonic, prompt_new_password, Cli, SeedPayload};
use crate::errors::{Result, VaultError};

/// Execute the `create` command.
pub async fn execute(cli: &Cli, id: Option<&str>, name: Option<&str>) -> Result<()> {
    let factory = factory(cli).await?;

    if let Some(id) = id {
        if factory.meta(id).await?.is_some() {
            return Err(VaultError::CommandFailed(format!(
                "vault '{id}' already exists"
            )));
        }
    }

    let payload = SeedPayload {
        mnemonic: prompt_mnemonic()?.to_string(),
    };
    let password = prompt_new_password("SEEDVAULT_PASSWORD")?;

    let mut vault = factory.open(id).await?;
    if let Some(name) = name {
        vault.set_meta("name", name).await?;
    }
    vault
        .set_meta("created_at", Utc::now().to_rfc3339())
        .await?;

    vault
        .set_password(password.as_bytes())
        .await?
        .save_json(&payload)
        .await?;

    output::success(&format!("Created vault '{}'", vault.id()));
    output::tip("Run `seedvault list` to see all vaults.");

    Ok(())
}
