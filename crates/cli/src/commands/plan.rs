//! Plans margin increases with the strategy simulation engine.

use anyhow::{anyhow, Result};
use clap::Args;
use margin_ladder_cli::CsvTradeSource;
use margin_ladder_core::{
    AppConfig, ConfigLoader, MetricsFormatter, PositionReconstructor, PositionSide,
    StrategySimulationEngine, TradeSource,
};
use rust_decimal::Decimal;
use std::path::Path;

/// Arguments for the plan command.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Current market price; seeds the first fill unless --trades is given
    #[arg(long)]
    pub price: Decimal,

    /// Seed margin (defaults to the first level's size)
    #[arg(long)]
    pub margin: Option<Decimal>,

    /// Position side (overrides the configured side)
    #[arg(long)]
    pub side: Option<PositionSide>,

    /// Seed from the still-open position in this CSV trade tape
    #[arg(long)]
    pub trades: Option<String>,

    /// Increase prices to apply in order
    #[arg(long = "increase")]
    pub increases: Vec<Decimal>,

    /// Number of steps to undo after applying the increases
    #[arg(long, default_value_t = 0)]
    pub down: usize,

    /// Print the scenario as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Runs the plan command.
///
/// # Errors
/// Returns an error if the config is invalid, the seed cannot be built or an
/// increase is rejected.
pub fn run_plan(args: PlanArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let side = args.side.unwrap_or(config.engine.side);
    let mut engine =
        StrategySimulationEngine::new(config.strategy, side, config.engine.maintenance_margin_rate)?;

    if let Some(path) = &args.trades {
        let trades = CsvTradeSource::new(path).trades()?;
        let result = PositionReconstructor::reconstruct(&trades)?;
        let open = result
            .open_position(side)
            .ok_or_else(|| anyhow!("No open {} position in {}", side, path))?;
        tracing::info!(
            "Seeding from open {} position: {} fill(s) at {}",
            side,
            open.open_trades.len(),
            open.open_price
        );
        engine.init_from_fills(&open.fills(), args.price)?;
    } else {
        let margin = args.margin.unwrap_or_else(|| engine.config().initial_margin());
        engine.init(args.price, margin)?;
    }

    for price in &args.increases {
        engine.level_up(*price)?;
    }
    for _ in 0..args.down {
        if engine.level_down().is_none() {
            tracing::warn!("Simulation history is empty");
            break;
        }
    }

    let scenario = engine.scenario().unwrap_or_default();
    if args.json {
        println!("{}", serde_json::to_string_pretty(scenario)?);
    } else {
        print!(
            "{}",
            MetricsFormatter::format_scenario(side, scenario, config.engine.price_precision)
        );
    }

    Ok(())
}

fn load_config(path: &str) -> Result<AppConfig> {
    if !Path::new(path).exists() {
        tracing::warn!("Config file {} not found, using defaults", path);
    }
    ConfigLoader::load_from(path)
}
