use clap::{Parser, Subcommand};

mod commands;

use commands::{PlanArgs, PositionsArgs};

#[derive(Parser)]
#[command(name = "margin-ladder")]
#[command(about = "Position reconstruction and margin ladder planning for leveraged futures", long_about = None)]
struct Cli {
    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild closed and open positions from a CSV trade tape
    Positions(PositionsArgs),
    /// Simulate leveling a position up and down through the margin tiers
    Plan(PlanArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Positions(args) => commands::run_positions(args)?,
        Commands::Plan(args) => commands::run_plan(args)?,
    }

    Ok(())
}
