//! Staler CLI - cleans up stale things.

use clap::Parser;
use staler_cli::{build_providers, Cli, Command, Config};
use staler_janitor::{Janitor, JanitorWorker};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> staler_cli::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing (log to stderr); RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Load config, then layer the command line on top
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(cli.dry_run, &cli.overrides);

    match cli.command.unwrap_or(Command::Run) {
        Command::Config => {
            print!("{}", config.redacted().to_toml()?);
        }
        Command::Run => {
            let providers = build_providers(&config)?;
            let mut janitor = Janitor::new(config.janitor, providers);
            janitor.sweep().await;
        }
        Command::Watch => {
            let providers = build_providers(&config)?;
            let mut worker = JanitorWorker::new(Janitor::new(config.janitor, providers))?;
            worker.run().await?;
        }
    }

    Ok(())
}
