//! `seedvault rekey`: change a vault's password.
//!
//! Unlocks the vault with the current password, then re-encrypts the
//! payload under the new password with a fresh salt.  The Argon2 params
//! from `seedvault.toml` are applied, so this is also how an existing
//! vault picks up stronger settings.

use crate::cli::output;
use crate::cli::{factory, prompt_new_password, prompt_password, settings, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `rekey` command.
pub async fn execute(cli: &Cli, id: &str) -> Result<()> {
    let factory = factory(cli).await?;
    if factory.meta(id).await?.is_none() {
        return Err(VaultError::NotFound(format!("vault '{id}'")));
    }
    let params = settings(cli)?.argon_params();

    // 1. Unlock with the current password.
    output::info("Enter your current vault password.");
    let old_password = prompt_password()?;
    let mut vault = factory.open(Some(id)).await?;
    vault.set_password(old_password.as_bytes()).await?;

    // 2. Prompt for the new password.
    output::info("Choose your new vault password.");
    let new_password = prompt_new_password("SEEDVAULT_NEW_PASSWORD")?;

    // 3. Re-encrypt under a fresh salt and the configured params.
    vault.rekey(new_password.as_bytes(), Some(params)).await?;

    output::success(&format!("Password changed for vault '{}'", vault.id()));

    Ok(())
}
