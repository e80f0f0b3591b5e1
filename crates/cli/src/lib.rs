//! Trade tape ingestion for the `margin-ladder` binary.

pub mod csv_source;

pub use csv_source::CsvTradeSource;
