//! `seedvault reveal`: decrypt and print a vault's seed phrase.

use crate::cli::output;
use crate::cli::{factory, prompt_password, Cli, SeedPayload};
use crate::errors::{Result, VaultError};

/// Execute the `reveal` command.
pub async fn execute(cli: &Cli, id: &str) -> Result<()> {
    let factory = factory(cli).await?;
    if factory.meta(id).await?.is_none() {
        return Err(VaultError::NotFound(format!("vault '{id}'")));
    }
    let password = prompt_password()?;

    let mut vault = factory.open(Some(id)).await?;
    let payload: SeedPayload = vault
        .set_password(password.as_bytes())
        .await?
        .load_json()
        .await?;

    output::warning("Anyone who sees this phrase controls the wallet.");
    println!("{}", payload.mnemonic);

    Ok(())
}
