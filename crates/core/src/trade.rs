use crate::error::{LadderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction in which a fill moved the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionSide {
    Buy,
    Sell,
}

impl ActionSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for ActionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical position a fill belongs to (hedge-mode accounts hold both at once).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub const ALL: [Self; 2] = [Self::Long, Self::Short];

    /// The fill action that opens or adds to this side.
    #[must_use]
    pub const fn opening_action(self) -> ActionSide {
        match self {
            Self::Long => ActionSide::Buy,
            Self::Short => ActionSide::Sell,
        }
    }

    /// The fill action that reduces or closes this side.
    #[must_use]
    pub const fn closing_action(self) -> ActionSide {
        match self {
            Self::Long => ActionSide::Sell,
            Self::Short => ActionSide::Buy,
        }
    }

    /// Sign applied to price offsets: `+1` for long, `-1` for short.
    #[must_use]
    pub const fn direction(self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => Decimal::NEGATIVE_ONE,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PositionSide {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            _ => Err(LadderError::invalid_input("position side", s)),
        }
    }
}

/// A single exchange fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Opaque fill identifier, possibly composite.
    pub id: String,
    /// Execution time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub action_side: ActionSide,
    pub position_side: PositionSide,
    pub price: Decimal,
    pub base_quantity: Decimal,
    /// Notional in quote currency; used as the weight for price averaging.
    pub quote_quantity: Decimal,
    /// Non-zero only on fills that reduced or closed a position.
    pub realized_pnl: Decimal,
    pub commission: Decimal,
}

impl Trade {
    /// Returns true if this fill opens or adds to its position side.
    #[must_use]
    pub fn is_opening(&self) -> bool {
        self.action_side == self.position_side.opening_action()
    }

    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Checks the numeric fields of the fill.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the trade if price or quantities are not
    /// positive, or the commission is negative.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("trade price", self.price),
            ("trade base quantity", self.base_quantity),
            ("trade quote quantity", self.quote_quantity),
        ];
        for (what, value) in checks {
            if value <= Decimal::ZERO {
                return Err(LadderError::invalid_input(
                    what,
                    format!("{value} (trade {})", self.id),
                ));
            }
        }
        if self.commission < Decimal::ZERO {
            return Err(LadderError::invalid_input(
                "trade commission",
                format!("{} (trade {})", self.commission, self.id),
            ));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::trade;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn opening_and_closing_actions_flip_by_side() {
        assert_eq!(PositionSide::Long.opening_action(), ActionSide::Buy);
        assert_eq!(PositionSide::Long.closing_action(), ActionSide::Sell);
        assert_eq!(PositionSide::Short.opening_action(), ActionSide::Sell);
        assert_eq!(PositionSide::Short.closing_action(), ActionSide::Buy);
    }

    #[test]
    fn opening_fill_depends_on_its_own_side() {
        let buy = |side| trade("t0", 1, side, ActionSide::Buy, dec!(100), dec!(1));
        assert!(buy(PositionSide::Long).is_opening());
        assert!(!buy(PositionSide::Short).is_opening());
    }

    #[test]
    fn sides_deserialize_from_exchange_names() {
        let side: PositionSide = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(side, PositionSide::Short);
        let action: ActionSide = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(action, ActionSide::Buy);
        assert_eq!("long".parse::<PositionSide>().unwrap(), PositionSide::Long);
        assert!("flat".parse::<PositionSide>().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_price() {
        let mut t = trade("t1", 1, PositionSide::Long, ActionSide::Buy, dec!(100), dec!(1));
        assert!(t.validate().is_ok());

        t.price = Decimal::ZERO;
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("trade t1"), "{err}");
    }

    #[test]
    fn validate_rejects_negative_commission() {
        let mut t = trade("t2", 1, PositionSide::Short, ActionSide::Sell, dec!(100), dec!(1));
        t.commission = dec!(-0.1);
        assert!(matches!(
            t.validate(),
            Err(LadderError::InvalidInput { what: "trade commission", .. })
        ));
    }

    #[test]
    fn datetime_converts_millis() {
        let t = trade("t3", 1_700_000_000_000, PositionSide::Long, ActionSide::Buy, dec!(1), dec!(1));
        assert_eq!(t.datetime().unwrap().timestamp(), 1_700_000_000);
    }
}
