//! Rebuilds positions from a CSV trade tape.

use anyhow::Result;
use clap::Args;
use margin_ladder_cli::CsvTradeSource;
use margin_ladder_core::{MetricsFormatter, PositionReconstructor, TradeSource};

/// Arguments for the positions command.
#[derive(Args, Debug, Clone)]
pub struct PositionsArgs {
    /// CSV file with the account's fills
    #[arg(short, long)]
    pub trades: String,

    /// Decimal places for printed prices
    #[arg(long, default_value_t = 2)]
    pub precision: u32,

    /// Print the full reconstruction as JSON instead of a report
    #[arg(long)]
    pub json: bool,
}

/// Runs the positions command.
///
/// # Errors
/// Returns an error if the tape cannot be read or fails validation.
pub fn run_positions(args: PositionsArgs) -> Result<()> {
    let trades = CsvTradeSource::new(&args.trades).trades()?;
    let result = PositionReconstructor::reconstruct(&trades)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", MetricsFormatter::format_reconstruction(&result, args.precision));
    }

    Ok(())
}
