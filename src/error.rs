//! Error types for perflog
//!
//! Parsing is lenient (unmatched lines are skipped, not reported here);
//! everything in this enum is fatal for the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// perflog error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed value inside a line that otherwise matched a grammar
    #[error("Format error: {0}")]
    Format(String),

    /// Positional merge of two tables with different lengths
    #[error("Row count mismatch: first table has {left} rows, second has {right}")]
    RowCountMismatch {
        /// Rows in the first (sequential) table
        left: usize,
        /// Rows in the second (parallel) table
        right: usize,
    },

    /// Input file exists but yielded no usable records
    #[error("Empty input: {} contains no usable records", .0.display())]
    EmptyInput(PathBuf),

    /// Required column absent from a table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Chart rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/CSV error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Summary serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
