//! Waggle CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use waggle::cli::{handle_plan, handle_run, Cli, Commands};
use waggle::infrastructure::{ConfigLoader, Logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };
    let _logging = Logging::init(&config.logging)?;

    match cli.command {
        Commands::Plan { content, plan } => handle_plan(content, plan).await,
        Commands::Run { content, plan, timeout } => handle_run(config, content, plan, timeout).await,
    }
}
