//! `seedvault meta`: show a vault's metadata without unlocking it.

use crate::cli::output;
use crate::cli::{factory, Cli};
use crate::errors::{Result, VaultError};

/// Execute the `meta` command.
pub async fn execute(cli: &Cli, id: &str) -> Result<()> {
    let factory = factory(cli).await?;

    let meta = factory
        .meta(id)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("vault '{id}'")))?;

    output::print_meta_table(&meta);

    Ok(())
}
