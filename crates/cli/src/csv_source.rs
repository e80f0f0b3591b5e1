//! CSV trade tape reader.
//!
//! Expected header:
//! `id,timestamp,action_side,position_side,price,base_quantity,quote_quantity,realized_pnl,commission`
//! with decimals written as plain strings (no float round trip).

use anyhow::{Context, Result};
use margin_ladder_core::{ActionSide, PositionSide, Trade, TradeSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct TradeRow {
    id: String,
    timestamp: i64,
    action_side: ActionSide,
    position_side: PositionSide,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    base_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    quote_quantity: Decimal,
    #[serde(default, deserialize_with = "zero_if_empty")]
    realized_pnl: Decimal,
    #[serde(default, deserialize_with = "zero_if_empty")]
    commission: Decimal,
}

/// Exchange exports leave pnl and fee cells blank on opening fills.
fn zero_if_empty<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw).map_err(serde::de::Error::custom)
}

impl From<TradeRow> for Trade {
    fn from(row: TradeRow) -> Self {
        Self {
            id: row.id,
            timestamp: row.timestamp,
            action_side: row.action_side,
            position_side: row.position_side,
            price: row.price,
            base_quantity: row.base_quantity,
            quote_quantity: row.quote_quantity,
            realized_pnl: row.realized_pnl,
            commission: row.commission,
        }
    }
}

/// Reads a trade tape from a CSV file and returns it sorted by timestamp.
pub struct CsvTradeSource {
    path: PathBuf,
}

impl CsvTradeSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses trades from any reader.
    ///
    /// # Errors
    ///
    /// Returns an error naming the 1-based record number of the first row
    /// that fails to parse.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<Trade>> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut trades = Vec::new();
        for (i, row) in csv.deserialize::<TradeRow>().enumerate() {
            let row = row.with_context(|| format!("Failed to parse trade record {}", i + 1))?;
            trades.push(Trade::from(row));
        }
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}

impl TradeSource for CsvTradeSource {
    fn trades(&mut self) -> Result<Vec<Trade>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open trade file {}", self.path.display()))?;
        let trades = Self::parse(file)?;
        tracing::info!("Loaded {} trade(s) from {}", trades.len(), self.path.display());
        Ok(trades)
    }
}
