//! `seedvault delete`: remove a vault and its key record.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{factory, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    let factory = factory(cli).await?;

    if factory.meta(id).await?.is_none() {
        output::info(&format!("No vault '{id}', nothing to delete."));
        return Ok(());
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete vault '{id}'? The seed phrase cannot be recovered from it afterwards."
            ))
            .default(false)
            .interact()
            .map_err(|e| VaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    factory.delete(id).await?;
    output::success(&format!("Deleted vault '{id}'"));

    Ok(())
}
