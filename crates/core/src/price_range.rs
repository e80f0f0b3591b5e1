//! Weighted entry price and liquidation price for a set of fills.
//!
//! The two computations are independent: reconstructing positions only needs
//! the weighted mean, while the strategy engine needs both.

use crate::error::{LadderError, Result};
use crate::trade::PositionSide;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Maintenance margin rate assumed when none is configured (0.5%).
pub const DEFAULT_MAINTENANCE_MARGIN_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// A fill reduced to the two numbers the price math needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub price: Decimal,
    /// Margin (or notional) committed by the fill, in quote currency.
    pub margin: Decimal,
}

impl Fill {
    #[must_use]
    pub const fn new(price: Decimal, margin: Decimal) -> Self {
        Self { price, margin }
    }
}

/// Result of [`compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub entry_price: Decimal,
    pub liquidation_price: Decimal,
    pub total_margin: Decimal,
}

/// Margin-weighted mean price: `Σ(price·margin) / Σ(margin)`.
///
/// Accumulates at full precision; callers round only when displaying.
///
/// # Errors
///
/// Returns `InvalidInput` if `fills` is empty or any fill has a non-positive
/// price or margin.
pub fn weighted_entry_price(fills: &[Fill]) -> Result<Decimal> {
    if fills.is_empty() {
        return Err(LadderError::invalid_input("fills", "empty fill list"));
    }

    let mut weighted = Decimal::ZERO;
    let mut total_margin = Decimal::ZERO;
    for fill in fills {
        if fill.margin <= Decimal::ZERO {
            return Err(LadderError::invalid_input("fill margin", fill.margin));
        }
        if fill.price <= Decimal::ZERO {
            return Err(LadderError::invalid_input("fill price", fill.price));
        }
        weighted += fill.price * fill.margin;
        total_margin += fill.margin;
    }

    Ok(weighted / total_margin)
}

/// Approximate isolated-margin liquidation price.
///
/// The position is liquidated once the unrealized loss eats the margin down to
/// the maintenance requirement. With notional `N = margin · leverage` the
/// margin terms cancel and the price reduces to:
///
/// ```text
/// long:  entry · (1 - 1/leverage + mmr)
/// short: entry · (1 + 1/leverage - mmr)
/// ```
///
/// Exchange tier tables are not modelled.
///
/// # Errors
///
/// Returns `InvalidInput` for a non-positive entry price or leverage, or a
/// maintenance rate outside `[0, 1/leverage)`.
pub fn liquidation_price(
    side: PositionSide,
    leverage: Decimal,
    entry_price: Decimal,
    maintenance_margin_rate: Decimal,
) -> Result<Decimal> {
    if leverage <= Decimal::ZERO {
        return Err(LadderError::invalid_input("leverage", leverage));
    }
    if entry_price <= Decimal::ZERO {
        return Err(LadderError::invalid_input("entry price", entry_price));
    }

    let initial_margin_rate = Decimal::ONE / leverage;
    if maintenance_margin_rate < Decimal::ZERO || maintenance_margin_rate >= initial_margin_rate {
        return Err(LadderError::invalid_input(
            "maintenance margin rate",
            format!("{maintenance_margin_rate} (leverage {leverage})"),
        ));
    }

    let buffer = initial_margin_rate - maintenance_margin_rate;
    Ok(entry_price * (Decimal::ONE - side.direction() * buffer))
}

/// Entry and liquidation price for `fills` held on `side` at `leverage`.
///
/// # Errors
///
/// Propagates the validation errors of [`weighted_entry_price`] and
/// [`liquidation_price`].
pub fn compute(
    side: PositionSide,
    leverage: Decimal,
    fills: &[Fill],
    maintenance_margin_rate: Decimal,
) -> Result<PriceRange> {
    let entry_price = weighted_entry_price(fills)?;
    let liquidation_price = liquidation_price(side, leverage, entry_price, maintenance_margin_rate)?;
    let total_margin = fills.iter().map(|f| f.margin).sum();

    Ok(PriceRange {
        entry_price,
        liquidation_price,
        total_margin,
    })
}

/// Rounds half away from zero to `dp` places. Only used at display
/// boundaries.
#[must_use]
pub fn round_price(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
