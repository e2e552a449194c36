//! autohunt binary entry point.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use autohunt::cli::{Cli, Commands};
use autohunt::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("cannot load config from {}", path.display()))?,
        None => Settings::load().context("cannot load configuration")?,
    };
    settings
        .ensure_runtime_dirs()
        .context("cannot create runtime directories")?;

    match &cli.command {
        Commands::Run(cmd) => cmd.execute(&settings, cli.quiet).await,
        Commands::Scan(cmd) => cmd.execute(&settings, cli.verbose, cli.quiet).await,
        Commands::Clean(cmd) => cmd.execute(&settings, cli.quiet),
        Commands::Store(cmd) => cmd.execute(&settings, cli.quiet).await,
        Commands::Scopes(cmd) => cmd.execute(&settings, cli.quiet).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
