//! boundplan CLI - anytime forward-search planning from the command line
//!
//! This CLI provides:
//! - Planning the counter domain from a single root state
//! - Simulating an episode that plans, acts and re-roots after every step
//!
//! Logging goes to stderr and is filtered with `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "boundplan")]
#[command(version, about = "Anytime forward-search planner with bounded value estimates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan from one root state and print the result
    Plan(boundplan::cli::commands::plan::PlanArgs),

    /// Plan, act and re-root until a terminal state is reached
    Simulate(boundplan::cli::commands::simulate::SimulateArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan(args) => boundplan::cli::commands::plan::execute(args),
        Commands::Simulate(args) => boundplan::cli::commands::simulate::execute(args),
    }
}
