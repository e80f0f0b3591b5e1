use crate::price_range::{round_price, Fill};
use crate::trade::{PositionSide, Trade};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed position rebuilt from its opening and closing fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    /// Timestamp (ms) of the first opening fill.
    pub open_time: i64,
    /// Timestamp (ms) of the last closing fill.
    pub close_time: i64,
    /// Quote-weighted mean price of the opening fills.
    pub open_price: Decimal,
    /// Quote-weighted mean price of the closing fills.
    pub close_price: Decimal,
    /// Base quantity opened.
    pub open_amount: Decimal,
    /// Base quantity closed.
    pub close_amount: Decimal,
    /// Quote notional opened.
    pub open_value: Decimal,
    /// Quote notional closed.
    pub close_value: Decimal,
    pub pnl: Decimal,
    pub fee: Decimal,
    pub open_trades: Vec<Trade>,
    pub close_trades: Vec<Trade>,
}

impl Position {
    /// Realized profit after commissions.
    #[must_use]
    pub fn net_pnl(&self) -> Decimal {
        self.pnl - self.fee
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.close_time - self.open_time)
    }

    /// Copy with prices rounded to `dp` decimal places for display.
    #[must_use]
    pub fn rounded(&self, dp: u32) -> Self {
        Self {
            open_price: round_price(self.open_price, dp),
            close_price: round_price(self.close_price, dp),
            ..self.clone()
        }
    }
}

/// Trailing opening fills that have not been closed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialPosition {
    pub side: PositionSide,
    pub open_time: i64,
    pub open_price: Decimal,
    pub open_amount: Decimal,
    pub open_value: Decimal,
    pub pnl: Decimal,
    pub fee: Decimal,
    pub open_trades: Vec<Trade>,
}

impl PartialPosition {
    /// The opening fills as `(price, quote notional)` pairs, for seeding a
    /// strategy simulation from this position.
    #[must_use]
    pub fn fills(&self) -> Vec<Fill> {
        self.open_trades
            .iter()
            .map(|t| Fill::new(t.price, t.quote_quantity))
            .collect()
    }
}

/// One reconstructed segment of a side's trade stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Closed(Position),
    /// Trailing opening fills with no closing fill yet.
    StillOpen(PartialPosition),
    /// Closing fills with no opening fills; never becomes a position.
    Discarded(DiscardedSegment),
}

impl Segment {
    /// All fills of the segment in tape order.
    #[must_use]
    pub fn trades(&self) -> Vec<&Trade> {
        match self {
            Self::Closed(p) => p.open_trades.iter().chain(&p.close_trades).collect(),
            Self::StillOpen(p) => p.open_trades.iter().collect(),
            Self::Discarded(d) => d.trades.iter().collect(),
        }
    }
}

/// Closing fills found with no opening fills before them, usually because the
/// fetched range starts in the middle of a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardedSegment {
    pub side: PositionSide,
    pub trades: Vec<Trade>,
}

/// Everything [`PositionReconstructor::reconstruct`](crate::PositionReconstructor::reconstruct)
/// found in a trade tape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Closed positions, ascending by `open_time`.
    pub positions: Vec<Position>,
    /// At most one still-open segment per side.
    pub open: Vec<PartialPosition>,
    pub discarded: Vec<DiscardedSegment>,
}

impl Reconstruction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.open.is_empty() && self.discarded.is_empty()
    }

    #[must_use]
    pub fn open_position(&self, side: PositionSide) -> Option<&PartialPosition> {
        self.open.iter().find(|p| p.side == side)
    }

    #[must_use]
    pub fn total_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.pnl).sum()
    }

    #[must_use]
    pub fn total_fee(&self) -> Decimal {
        self.positions.iter().map(|p| p.fee).sum()
    }
}
