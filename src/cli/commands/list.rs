//! `seedvault list`: display all vaults in a table.

use crate::cli::output;
use crate::cli::{factory, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let factory = factory(cli).await?;

    let mut vaults = Vec::new();
    for id in factory.list().await? {
        let meta = factory.meta(&id).await?.unwrap_or_default();
        vaults.push((id, meta));
    }

    output::info(&format!("{} vault(s)", vaults.len()));
    output::print_vaults_table(&vaults);

    Ok(())
}
