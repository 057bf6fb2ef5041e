use clap::Parser;
use seedvault::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SEEDVAULT_LOG").unwrap_or_else(|_| "seedvault=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Create { ref id, ref name } => {
            seedvault::cli::commands::create::execute(&cli, id.as_deref(), name.as_deref()).await
        }
        Commands::List => seedvault::cli::commands::list::execute(&cli).await,
        Commands::Meta { ref id } => seedvault::cli::commands::meta::execute(&cli, id).await,
        Commands::Reveal { ref id } => seedvault::cli::commands::reveal::execute(&cli, id).await,
        Commands::Rekey { ref id } => seedvault::cli::commands::rekey::execute(&cli, id).await,
        Commands::Delete { ref id, force } => {
            seedvault::cli::commands::delete::execute(&cli, id, force).await
        }
    };

    if let Err(e) = result {
        seedvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
