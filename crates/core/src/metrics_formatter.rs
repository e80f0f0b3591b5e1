#![allow(clippy::format_push_string)]

use crate::position::{Position, Reconstruction};
use crate::price_range::round_price;
use crate::simulation::StrategyState;
use crate::trade::PositionSide;
use chrono::{DateTime, Utc};

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════════\n";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────────\n";

/// Plain-text reports for the command line.
pub struct MetricsFormatter;

impl MetricsFormatter {
    #[must_use]
    pub fn format_reconstruction(result: &Reconstruction, dp: u32) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE_HEAVY);
        output.push_str("                    RECONSTRUCTED POSITIONS                    \n");
        output.push_str(RULE_HEAVY);
        output.push('\n');

        if result.positions.is_empty() {
            output.push_str("No closed positions.\n");
        }
        for (i, position) in result.positions.iter().enumerate() {
            output.push_str(&Self::format_position(i + 1, position, dp));
        }

        if !result.open.is_empty() {
            output.push_str("\nOpen Positions\n");
            output.push_str(RULE_LIGHT);
            for open in &result.open {
                output.push_str(&format!(
                    "{:<6} opened {}  entry {}  amount {}  fills {}\n",
                    open.side.as_str(),
                    format_millis(open.open_time),
                    round_price(open.open_price, dp),
                    open.open_amount,
                    open.open_trades.len()
                ));
            }
        }

        if !result.discarded.is_empty() {
            output.push_str("\nDiscarded Closing Fills (no opening fills in range)\n");
            output.push_str(RULE_LIGHT);
            for discarded in &result.discarded {
                let ids: Vec<&str> = discarded.trades.iter().map(|t| t.id.as_str()).collect();
                output.push_str(&format!("{:<6} {}\n", discarded.side.as_str(), ids.join(", ")));
            }
        }

        output.push('\n');
        output.push_str(RULE_LIGHT);
        output.push_str(&format!(
            "Realized PnL: {}   Fees: {}   Net: {}\n",
            round_price(result.total_pnl(), dp),
            round_price(result.total_fee(), dp),
            round_price(result.total_pnl() - result.total_fee(), dp)
        ));
        output.push_str(RULE_HEAVY);

        output
    }

    fn format_position(index: usize, position: &Position, dp: u32) -> String {
        let p = position.rounded(dp);
        let duration = p.duration();
        format!(
            "#{index:<3} {:<6} {} -> {} ({}h {}m)\n     open {} x {}  close {} x {}  pnl {}  fee {}\n",
            p.side.as_str(),
            format_millis(p.open_time),
            format_millis(p.close_time),
            duration.num_hours(),
            duration.num_minutes() % 60,
            p.open_price,
            p.open_amount,
            p.close_price,
            p.close_amount,
            p.pnl,
            p.fee
        )
    }

    #[must_use]
    pub fn format_scenario(side: PositionSide, scenario: &[StrategyState], dp: u32) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE_HEAVY);
        output.push_str(&format!("                    {side} STRATEGY PLAN\n"));
        output.push_str(RULE_HEAVY);
        output.push_str(&format!(
            "{:<5} {:>10} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
            "Level", "Margin", "Market", "Entry", "Target", "Stop", "Increase", "Liquidation"
        ));
        output.push_str(RULE_LIGHT);

        for state in scenario {
            let s = state.rounded(dp);
            output.push_str(&format!(
                "{:<5} {:>10} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
                s.level_number,
                s.margin,
                s.market_price,
                s.entry_price,
                s.target_price,
                s.stop_loss_price,
                s.increase_price,
                s.liquidation_price
            ));
        }

        match scenario.last() {
            Some(last) if last.is_top_level() => output.push_str("\nTop level reached.\n"),
            Some(_) => {}
            None => output.push_str("No simulation.\n"),
        }
        output.push_str(RULE_HEAVY);

        output
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
