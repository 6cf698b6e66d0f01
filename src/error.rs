use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type StockscopeResult<T> = Result<T, StockscopeError>;

#[derive(Debug, Error)]
pub enum StockscopeError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    System(#[from] SystemError),
}

impl StockscopeError {
    /// Returns true for configuration mismatches (missing or mistyped columns),
    /// as opposed to missing files or rejected queries.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Data(DataError::Schema { .. }))
    }

    pub fn is_source_not_found(&self) -> bool {
        matches!(self, Self::Io(IoError::SourceNotFound(_)))
    }
}

/// Errors related to table layout, parsing and data frame operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Schema error in '{table}': {msg}")]
    Schema { table: String, msg: String },

    #[error("Data frame error: {0}")]
    DataFrame(String),
}

impl DataError {
    pub(crate) fn missing_column(table: impl Into<String>, column: &str) -> Self {
        Self::Schema {
            table: table.into(),
            msg: format!("required column '{column}' not found"),
        }
    }
}

/// Errors related to file I/O and serialization.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),
}

/// Errors caused by invalid user selections.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Start date {start} must not be after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("Start year {start} must not be after end year {end}")]
    InvertedYears { start: i32, end: i32 },

    #[error("Year {0} is outside the supported calendar")]
    YearOutOfRange(i32),

    #[error("Invalid model label: '{0}'")]
    InvalidModelLabel(String),

    #[error("Invalid ticker: '{0}'")]
    InvalidTicker(String),
}

/// Errors related to internal invariants.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
