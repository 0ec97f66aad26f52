use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dispatchbox")]
#[command(about = "Background job dispatcher", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides DISPATCHBOX_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every configured queue and run jobs until interrupted
    Work,
    /// Push a job onto a queue
    Enqueue(EnqueueArgs),
    /// Show processed/failed counters
    Stats(StatsArgs),
    /// List entries from the failure log
    Failed(FailedArgs),
}

#[derive(clap::Args, Debug)]
pub struct EnqueueArgs {
    /// Queue name
    pub queue: String,
    /// Job name
    pub class: String,
    /// Job arguments; each is parsed as JSON, falling back to a plain string
    pub args: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatsArgs {
    /// Show counters for one job name instead of the global ones
    #[arg(long)]
    pub job: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct FailedArgs {
    /// Index of the first entry to show
    #[arg(long, default_value_t = 0)]
    pub start: usize,
    /// Maximum number of entries to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}
