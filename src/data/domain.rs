use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::{QueryError, StockscopeError, StockscopeResult};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// A stock symbol as it appears in the `Ticker` column.
///
/// Matching is exact and case-sensitive; no normalization is applied beyond
/// rejecting empty input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> StockscopeResult<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(QueryError::InvalidTicker(symbol).into());
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Name of an anomaly model, which doubles as the name of its 0/1 flag column.
///
/// The set of models is open: any non-empty label is accepted, the labels
/// in [`KnownModel`] are merely the ones shipped by the upstream pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelLabel(String);

impl ModelLabel {
    pub fn new(label: impl Into<String>) -> StockscopeResult<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(QueryError::InvalidModelLabel(label).into());
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelLabel {
    type Err = StockscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModelLabel {
    type Error = StockscopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelLabel> for String {
    fn from(value: ModelLabel) -> Self {
        value.0
    }
}

impl From<KnownModel> for ModelLabel {
    fn from(value: KnownModel) -> Self {
        Self(value.as_str().to_string())
    }
}

/// Models produced by the upstream anomaly pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
pub enum KnownModel {
    #[strum(serialize = "baseline")]
    Baseline,
    #[strum(serialize = "svm")]
    Svm,
    #[strum(serialize = "dbscan_pca")]
    DbscanPca,
    #[strum(serialize = "dbscan_nonpca")]
    DbscanNonPca,
    #[strum(serialize = "isolation tree")]
    IsolationTree,
    /// Union flag of the reference table fed to the matcher.
    #[strum(serialize = "Overall_Anomaly")]
    OverallAnomaly,
}

impl KnownModel {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// The models a user can pick for comparison, in display order.
    pub fn selectable() -> Vec<ModelLabel> {
        Self::iter()
            .filter(|m| *m != Self::OverallAnomaly)
            .map(ModelLabel::from)
            .collect()
    }
}

// ================================================================================================
// Date Range
// ================================================================================================

/// A closed calendar interval `[start, end]`.
///
/// # Semantics
/// Both bounds are inclusive. A range can only be built with
/// `start <= end`; an inverted range is a user input error and is
/// rejected here, before any filter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = StockscopeError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// # Errors
    /// Returns [`QueryError::InvertedRange`] if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> StockscopeResult<Self> {
        if start > end {
            return Err(QueryError::InvertedRange { start, end }.into());
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// A closed interval of calendar years, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// # Errors
    /// [`QueryError::InvertedYears`] if `start > end`, and
    /// [`QueryError::YearOutOfRange`] for years chrono cannot represent.
    pub fn new(start: i32, end: i32) -> StockscopeResult<Self> {
        if start > end {
            return Err(QueryError::InvertedYears { start, end }.into());
        }
        for year in [start, end] {
            if NaiveDate::from_yo_opt(year, 1).is_none() {
                return Err(QueryError::YearOutOfRange(year).into());
            }
        }
        Ok(Self { start, end })
    }

    /// The years covered by `range`.
    pub fn spanning(range: DateRange) -> Self {
        Self {
            start: range.start().year(),
            end: range.end().year(),
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date.year())
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}
