use polars::prelude::PlSmallStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Suffix of the membership columns appended by the anomaly matcher.
pub const MATCH_SUFFIX: &str = "_match";

/// The column vocabulary shared by price and anomaly tables.
///
/// The string form of each variant is the literal CSV header name (after
/// whitespace trimming), so these names must never be re-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter)]
pub enum TableCol {
    // ========================================================================
    // Key
    // ========================================================================
    /// Stock symbol (e.g., "AAPL").
    Ticker,
    /// Trading day.
    Date,

    // ========================================================================
    // Price Data
    // ========================================================================
    /// Dividend and split adjusted close price.
    #[strum(serialize = "Adj Close")]
    AdjClose,
    Volume,
    /// Daily return.
    Return,
}

impl From<TableCol> for PlSmallStr {
    fn from(value: TableCol) -> Self {
        value.as_str().into()
    }
}

impl TableCol {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// The composite join key of every table.
    pub fn key() -> [TableCol; 2] {
        [Self::Ticker, Self::Date]
    }
}

/// Name of the membership column for a candidate label, e.g. `svm_match`.
pub fn match_column(label: &str) -> String {
    format!("{label}{MATCH_SUFFIX}")
}
