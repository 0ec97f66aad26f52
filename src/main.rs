mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use dispatchbox::config::Config;
use dispatchbox::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.telemetry);

    match cli.command {
        Commands::Work => commands::work(&config).await?,
        Commands::Enqueue(args) => commands::enqueue(&config, args).await?,
        Commands::Stats(args) => commands::stats(&config, args).await?,
        Commands::Failed(args) => commands::failed(&config, args).await?,
    }

    Ok(())
}
