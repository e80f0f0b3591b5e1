//! Segments a fill tape into positions.
//!
//! Each position side is processed independently. Opening fills accumulate
//! until a closing fill shows up; the next opening fill after a closing run
//! (or the final fill of the tape, if it closes) seals the position.

use crate::error::{LadderError, Result};
use crate::position::{DiscardedSegment, PartialPosition, Position, Reconstruction, Segment};
use crate::price_range::{weighted_entry_price, Fill};
use crate::trade::{PositionSide, Trade};
use rust_decimal::Decimal;
use std::mem;

pub struct PositionReconstructor;

impl PositionReconstructor {
    /// Rebuilds every position in `trades`.
    ///
    /// `trades` must belong to one account and be sorted ascending by
    /// timestamp. Closed positions come back ordered by `open_time`; the
    /// trailing open segment of each side and any closing-only leading runs
    /// are reported separately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the tape is out of order or a fill fails
    /// [`Trade::validate`].
    pub fn reconstruct(trades: &[Trade]) -> Result<Reconstruction> {
        Self::check_tape(trades)?;

        let mut result = Reconstruction::default();
        for side in PositionSide::ALL {
            for segment in Self::side_segments(side, trades)? {
                match segment {
                    Segment::Closed(position) => result.positions.push(position),
                    Segment::StillOpen(partial) => result.open.push(partial),
                    Segment::Discarded(discarded) => result.discarded.push(discarded),
                }
            }
        }
        result.positions.sort_by_key(|p| p.open_time);

        tracing::info!(
            "Reconstructed {} closed position(s), {} open, {} discarded from {} trade(s)",
            result.positions.len(),
            result.open.len(),
            result.discarded.len(),
            trades.len()
        );

        Ok(result)
    }

    /// Segments for a single side, in tape order. Fills of the other side are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Same as [`reconstruct`](Self::reconstruct).
    pub fn segments(side: PositionSide, trades: &[Trade]) -> Result<Vec<Segment>> {
        Self::check_tape(trades)?;
        Self::side_segments(side, trades)
    }

    fn check_tape(trades: &[Trade]) -> Result<()> {
        for trade in trades {
            trade.validate()?;
        }
        if let Some(pair) = trades.windows(2).find(|w| w[1].timestamp < w[0].timestamp) {
            return Err(LadderError::invalid_input(
                "trade order",
                format!(
                    "trade {} at {} precedes trade {} at {}",
                    pair[1].id, pair[1].timestamp, pair[0].id, pair[0].timestamp
                ),
            ));
        }
        Ok(())
    }

    fn side_segments(side: PositionSide, trades: &[Trade]) -> Result<Vec<Segment>> {
        let side_trades: Vec<&Trade> = trades.iter().filter(|t| t.position_side == side).collect();
        let last = side_trades.len().saturating_sub(1);

        let mut segments = Vec::new();
        let mut opening: Vec<Trade> = Vec::new();
        let mut closing: Vec<Trade> = Vec::new();

        for (i, &trade) in side_trades.iter().enumerate() {
            let opens = trade.is_opening();
            if opens && !closing.is_empty() {
                segments.push(finalize(side, mem::take(&mut opening), mem::take(&mut closing))?);
                opening.push(trade.clone());
            } else if opens {
                opening.push(trade.clone());
            } else if i == last {
                closing.push(trade.clone());
                segments.push(finalize(side, mem::take(&mut opening), mem::take(&mut closing))?);
            } else {
                closing.push(trade.clone());
            }
        }

        if !opening.is_empty() {
            segments.push(Segment::StillOpen(still_open(side, opening)?));
        }

        Ok(segments)
    }
}

/// Closed positions only, ascending by `open_time`.
///
/// # Errors
///
/// Same as [`PositionReconstructor::reconstruct`].
pub fn reconstruct_positions(trades: &[Trade]) -> Result<Vec<Position>> {
    PositionReconstructor::reconstruct(trades).map(|r| r.positions)
}

fn finalize(side: PositionSide, opening: Vec<Trade>, closing: Vec<Trade>) -> Result<Segment> {
    if opening.is_empty() {
        tracing::warn!(
            "Discarding {} {} closing trade(s) with no opening trades",
            closing.len(),
            side
        );
        return Ok(Segment::Discarded(DiscardedSegment {
            side,
            trades: closing,
        }));
    }

    let open_time = opening[0].timestamp;
    let close_time = closing.last().map_or(open_time, |t| t.timestamp);
    let pnl = opening.iter().chain(&closing).map(|t| t.realized_pnl).sum();
    let fee = opening.iter().chain(&closing).map(|t| t.commission).sum();

    Ok(Segment::Closed(Position {
        side,
        open_time,
        close_time,
        open_price: quote_weighted_price(&opening)?,
        close_price: quote_weighted_price(&closing)?,
        open_amount: sum(&opening, |t| t.base_quantity),
        close_amount: sum(&closing, |t| t.base_quantity),
        open_value: sum(&opening, |t| t.quote_quantity),
        close_value: sum(&closing, |t| t.quote_quantity),
        pnl,
        fee,
        open_trades: opening,
        close_trades: closing,
    }))
}

fn still_open(side: PositionSide, opening: Vec<Trade>) -> Result<PartialPosition> {
    let open_time = opening.first().map_or(0, |t| t.timestamp);
    Ok(PartialPosition {
        side,
        open_time,
        open_price: quote_weighted_price(&opening)?,
        open_amount: sum(&opening, |t| t.base_quantity),
        open_value: sum(&opening, |t| t.quote_quantity),
        pnl: sum(&opening, |t| t.realized_pnl),
        fee: sum(&opening, |t| t.commission),
        open_trades: opening,
    })
}

fn quote_weighted_price(trades: &[Trade]) -> Result<Decimal> {
    let fills: Vec<Fill> = trades
        .iter()
        .map(|t| Fill::new(t.price, t.quote_quantity))
        .collect();
    weighted_entry_price(&fills)
}

fn sum(trades: &[Trade], field: impl Fn(&Trade) -> Decimal) -> Decimal {
    trades.iter().map(field).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::fixtures::trade;
    use crate::trade::ActionSide::{Buy, Sell};
    use crate::trade::PositionSide::{Long, Short};
    use rust_decimal_macros::dec;

    fn closed(segment: &Segment) -> &Position {
        match segment {
            Segment::Closed(p) => p,
            other => panic!("expected closed segment, got {other:?}"),
        }
    }

    #[test]
    fn empty_tape_is_empty_result() {
        let result = PositionReconstructor::reconstruct(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn simple_long_round_trip() {
        let mut close = trade("c1", 3, Long, Sell, dec!(110), dec!(2));
        close.realized_pnl = dec!(20);
        close.commission = dec!(0.2);
        let mut open = trade("o1", 1, Long, Buy, dec!(100), dec!(1));
        open.commission = dec!(0.1);
        let trades = vec![
            open,
            trade("o2", 2, Long, Buy, dec!(100), dec!(1)),
            close,
        ];

        let positions = reconstruct_positions(&trades).unwrap();
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!(p.side, Long);
        assert_eq!(p.open_time, 1);
        assert_eq!(p.close_time, 3);
        assert_eq!(p.open_price, dec!(100));
        assert_eq!(p.close_price, dec!(110));
        assert_eq!(p.open_amount, dec!(2));
        assert_eq!(p.close_amount, dec!(2));
        assert_eq!(p.open_value, dec!(200));
        assert_eq!(p.pnl, dec!(20));
        assert_eq!(p.fee, dec!(0.3));
        assert_eq!(p.net_pnl(), dec!(19.7));
        assert_eq!(p.open_trades.len(), 2);
        assert_eq!(p.close_trades.len(), 1);
    }

    #[test]
    fn open_price_is_quote_weighted() {
        let trades = vec![
            trade("o1", 1, Long, Buy, dec!(100), dec!(1)),
            trade("o2", 2, Long, Buy, dec!(200), dec!(1)),
            trade("c1", 3, Long, Sell, dec!(150), dec!(2)),
        ];
        let p = &reconstruct_positions(&trades).unwrap()[0];
        // quote weights 100 and 200: (100*100 + 200*200) / 300
        assert_eq!(p.open_price.round_dp(4), dec!(166.6667));
    }

    #[test]
    fn opening_after_closing_run_starts_new_position() {
        let trades = vec![
            trade("o1", 1, Short, Sell, dec!(100), dec!(1)),
            trade("c1", 2, Short, Buy, dec!(95), dec!(0.5)),
            trade("c2", 3, Short, Buy, dec!(94), dec!(0.5)),
            trade("o2", 4, Short, Sell, dec!(97), dec!(1)),
            trade("c3", 5, Short, Buy, dec!(96), dec!(1)),
        ];

        let segments = PositionReconstructor::segments(Short, &trades).unwrap();
        assert_eq!(segments.len(), 2);
        let first = closed(&segments[0]);
        assert_eq!((first.open_time, first.close_time), (1, 3));
        assert_eq!(first.close_trades.len(), 2);
        let second = closed(&segments[1]);
        assert_eq!((second.open_time, second.close_time), (4, 5));
    }

    #[test]
    fn trailing_open_segment_is_reported_not_dropped() {
        let trades = vec![
            trade("o1", 1, Long, Buy, dec!(100), dec!(1)),
            trade("c1", 2, Long, Sell, dec!(101), dec!(1)),
            trade("o2", 3, Long, Buy, dec!(102), dec!(1)),
            trade("o3", 4, Long, Buy, dec!(104), dec!(1)),
        ];

        let result = PositionReconstructor::reconstruct(&trades).unwrap();
        assert_eq!(result.positions.len(), 1);
        let open = result.open_position(Long).unwrap();
        assert_eq!(open.open_time, 3);
        assert_eq!(open.open_amount, dec!(2));
        assert_eq!(open.open_trades.len(), 2);
        assert_eq!(open.fills().len(), 2);
        assert!(result.open_position(Short).is_none());
    }

    #[test]
    fn leading_closing_run_is_discarded() {
        let trades = vec![
            trade("c0", 1, Long, Sell, dec!(99), dec!(1)),
            trade("o1", 2, Long, Buy, dec!(100), dec!(1)),
            trade("c1", 3, Long, Sell, dec!(101), dec!(1)),
        ];

        let result = PositionReconstructor::reconstruct(&trades).unwrap();
        assert_eq!(result.positions.len(), 1);
        assert_eq!(result.positions[0].open_time, 2);
        assert_eq!(result.discarded.len(), 1);
        assert_eq!(result.discarded[0].trades[0].id, "c0");
    }

    #[test]
    fn lone_closing_trade_is_discarded() {
        let trades = vec![trade("c0", 1, Short, Buy, dec!(99), dec!(1))];
        let result = PositionReconstructor::reconstruct(&trades).unwrap();
        assert!(result.positions.is_empty());
        assert_eq!(result.discarded.len(), 1);
    }

    #[test]
    fn sides_are_merged_by_open_time() {
        let trades = vec![
            trade("s-o", 1, Short, Sell, dec!(100), dec!(1)),
            trade("l-o", 2, Long, Buy, dec!(100), dec!(1)),
            trade("l-c", 3, Long, Sell, dec!(101), dec!(1)),
            trade("s-c", 4, Short, Buy, dec!(99), dec!(1)),
        ];

        let positions = reconstruct_positions(&trades).unwrap();
        let sides: Vec<_> = positions.iter().map(|p| p.side).collect();
        assert_eq!(sides, vec![Short, Long]);
    }

    #[test]
    fn unsorted_tape_rejected() {
        let trades = vec![
            trade("a", 5, Long, Buy, dec!(100), dec!(1)),
            trade("b", 4, Long, Sell, dec!(100), dec!(1)),
        ];
        let err = PositionReconstructor::reconstruct(&trades).unwrap_err();
        assert!(err.to_string().contains("trade b at 4"), "{err}");
    }

    #[test]
    fn rounded_only_touches_prices() {
        let trades = vec![
            trade("o1", 1, Long, Buy, dec!(100), dec!(1)),
            trade("o2", 2, Long, Buy, dec!(200), dec!(1)),
            trade("c1", 3, Long, Sell, dec!(150), dec!(2)),
        ];
        let p = &reconstruct_positions(&trades).unwrap()[0];
        let r = p.rounded(2);
        assert_eq!(r.open_price, dec!(166.67));
        assert_eq!(r.open_value, p.open_value);
    }
}
