//! listharvest CLI: discover listing links into manifests, then extract
//! manifests into published records.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = commands::resolve_config(&cli)?;
    commands::init_tracing(&cli, &config);
    commands::run(cli, config).await
}
