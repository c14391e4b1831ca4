//! ship CLI
#![allow(missing_docs)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ship_cli::cmd;
use ship_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Diagnostics go to stderr; user-facing output comes from the reporter.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = cli.layout();

    let code = match cli.command {
        Commands::Update => cmd::update::update(layout).await?,
        Commands::Add { name } => cmd::add::add(layout, &name)?,
        Commands::Sync => cmd::sync::sync(layout).await?,
    };
    Ok(ExitCode::from(code))
}
