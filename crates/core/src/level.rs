//! Margin tier lookup.

use crate::config::{Level, StrategyConfig};
use crate::error::{LadderError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The tier a margin amount falls in, and the one above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// 1-based tier number.
    pub level_number: usize,
    pub current: Level,
    /// `None` on the open-ended top tier.
    pub next: Option<Level>,
}

impl Resolution {
    /// Margin the next increase adds to reach the next tier's ceiling, or
    /// `None` when already on the top tier.
    #[must_use]
    pub fn allotment(&self, cumulative_margin: Decimal) -> Option<Decimal> {
        self.next.map(|next| next.size - cumulative_margin)
    }

    #[must_use]
    pub const fn is_top(&self) -> bool {
        self.next.is_none()
    }
}

pub struct StrategyLevelResolver;

impl StrategyLevelResolver {
    /// Finds the tier for `margin`.
    ///
    /// Tier `i` covers `(levels[i-1].size, levels[i].size]` with the first tier
    /// starting at zero; the last tier covers everything above the previous
    /// ceiling. Every positive margin maps to exactly one tier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `margin` is not positive or the ladder has no
    /// levels.
    pub fn resolve(config: &StrategyConfig, margin: Decimal) -> Result<Resolution> {
        if margin <= Decimal::ZERO {
            return Err(LadderError::invalid_input("margin", margin));
        }
        let Some(top) = config.levels.len().checked_sub(1) else {
            return Err(LadderError::invalid_input("level count", 0));
        };

        let index = config
            .levels
            .iter()
            .take(top)
            .position(|level| margin <= level.size)
            .unwrap_or(top);

        Ok(Resolution {
            level_number: index + 1,
            current: config.levels[index],
            next: config.levels.get(index + 1).copied(),
        })
    }
}
