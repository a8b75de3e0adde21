mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackreg", about = "Drift registration for temporal image stacks")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register every channel of one job
    Register(commands::register::RegisterArgs),
    /// Register many jobs in parallel
    Batch(commands::batch::BatchArgs),
    /// Reapply saved transforms to every channel of a job
    Apply(commands::apply::ApplyArgs),
    /// Show .stk file metadata
    Info(commands::info::InfoArgs),
    /// Print or save the default registration config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Register(args) => commands::register::run(args),
        Commands::Batch(args) => commands::batch::run(args),
        Commands::Apply(args) => commands::apply::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
