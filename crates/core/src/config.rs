use crate::error::{LadderError, Result};
use crate::price_range::DEFAULT_MAINTENANCE_MARGIN_RATE;
use crate::trade::PositionSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of margin tiers in a strategy ladder.
pub const LEVEL_COUNT: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// One margin tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Cumulative margin ceiling of the tier, in quote currency.
    pub size: Decimal,
    /// Price move, in percent, to the take-profit price.
    pub target: Decimal,
}

/// A trading plan: leverage, margin tiers and exit percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub leverage: Decimal,
    pub levels: Vec<Level>,
    /// Account-level stop loss in percent, before leverage.
    pub stop_loss: Decimal,
    /// Distance from liquidation, in percent, at which the next increase is
    /// allowed.
    pub level_increase_requirement: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub maintenance_margin_rate: Decimal,
    /// Decimal places used when printing prices.
    pub price_precision: u32,
    pub side: PositionSide,
}

impl StrategyConfig {
    /// Checks the ladder is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the ladder does not have exactly
    /// [`LEVEL_COUNT`] tiers with strictly increasing positive sizes, or if
    /// leverage, the increase requirement or a target is not positive, or the
    /// stop loss is negative.
    pub fn validate(&self) -> Result<()> {
        if self.leverage <= Decimal::ZERO {
            return Err(LadderError::invalid_input("leverage", self.leverage));
        }
        if self.levels.len() != LEVEL_COUNT {
            return Err(LadderError::invalid_input(
                "level count",
                format!("{} (expected {LEVEL_COUNT})", self.levels.len()),
            ));
        }
        if self.stop_loss < Decimal::ZERO {
            return Err(LadderError::invalid_input("stop loss", self.stop_loss));
        }
        if self.level_increase_requirement <= Decimal::ZERO {
            return Err(LadderError::invalid_input(
                "level increase requirement",
                self.level_increase_requirement,
            ));
        }

        let mut floor = Decimal::ZERO;
        for (i, level) in self.levels.iter().enumerate() {
            if level.size <= floor {
                return Err(LadderError::invalid_input(
                    "level size",
                    format!("level {} size {} must exceed {floor}", i + 1, level.size),
                ));
            }
            if level.target <= Decimal::ZERO {
                return Err(LadderError::invalid_input(
                    "level target",
                    format!("level {} target {}", i + 1, level.target),
                ));
            }
            floor = level.size;
        }

        Ok(())
    }

    /// Margin of the first tier, used to seed a fresh simulation.
    #[must_use]
    pub fn initial_margin(&self) -> Decimal {
        self.levels.first().map_or(Decimal::ZERO, |l| l.size)
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns the first validation failure of the strategy ladder.
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            leverage: Decimal::from(10),
            levels: vec![
                Level {
                    size: Decimal::from(100),
                    target: Decimal::from(2),
                },
                Level {
                    size: Decimal::from(300),
                    target: Decimal::from(3),
                },
                Level {
                    size: Decimal::from(600),
                    target: Decimal::from(4),
                },
                Level {
                    size: Decimal::from(1200),
                    target: Decimal::from(5),
                },
            ],
            stop_loss: Decimal::from(50),
            level_increase_requirement: Decimal::from(5),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            maintenance_margin_rate: DEFAULT_MAINTENANCE_MARGIN_RATE,
            price_precision: 2,
            side: PositionSide::Long,
        }
    }
}
