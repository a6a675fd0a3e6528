//! Bar storage and ingest: column-oriented series, CSV loading, views.

pub mod load;
pub mod series;
pub mod synthetic;

pub use series::{BarSeries, ColumnView, DataView, TimestampView};
pub use synthetic::synthetic_walk;

use thiserror::Error;

/// Malformed or missing input data. Fatal at load/construction time.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("input contains no data rows")]
    Empty,

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("column '{column}' row {row}: '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("timestamps decrease at index {0}")]
    UnorderedTimestamps(usize),

    #[error("column '{column}' has {got} rows, expected {expected}")]
    ColumnLength {
        column: String,
        got: usize,
        expected: usize,
    },
}
