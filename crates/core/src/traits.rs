use crate::trade::Trade;
use anyhow::Result;

/// Supplies the fill tape for one account.
///
/// Implementations return trades sorted ascending by timestamp; fetching,
/// pagination and retries live behind this boundary.
pub trait TradeSource {
    fn trades(&mut self) -> Result<Vec<Trade>>;
}

impl TradeSource for Vec<Trade> {
    fn trades(&mut self) -> Result<Vec<Trade>> {
        let mut trades = std::mem::take(self);
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}
