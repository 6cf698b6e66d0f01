use std::path::Path;

use itertools::Itertools;
use polars::{frame::DataFrame, prelude::ChunkAgg};

use crate::{
    data::{
        domain::{DateRange, ModelLabel, Ticker, YearRange},
        filter::{FilteredSubset, filter, filter_years},
        loader::{LoadReport, TableKind, load_table, normalize},
        polars_ext::{DataFrameExt, days_to_date},
        schema::{MATCH_SUFFIX, TableCol},
    },
    error::{DataError, StockscopeResult, SystemError},
};

/// Common read-only access to a normalized table.
pub trait Table {
    /// Access the underlying DataFrame (Immutable).
    fn as_df(&self) -> &DataFrame;

    /// Row accounting of the load that produced this table.
    fn load_report(&self) -> LoadReport;

    fn len(&self) -> usize {
        self.as_df().height()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows of `ticker` with a date inside `range`.
    fn filter(&self, range: DateRange, ticker: &Ticker) -> StockscopeResult<FilteredSubset> {
        filter(self.as_df(), range, ticker)
    }
}

// ================================================================================================
// Price Table
// ================================================================================================

/// Daily adjusted close prices of many tickers, ascending by date.
///
/// Every row has a valid `Date` and `Adj Close`.
#[derive(Debug, Clone)]
pub struct PriceTable {
    df: DataFrame,
    report: LoadReport,
}

impl Table for PriceTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn load_report(&self) -> LoadReport {
        self.report
    }
}

impl PriceTable {
    pub fn load(path: impl AsRef<Path>) -> StockscopeResult<Self> {
        let (df, report) = load_table(path.as_ref(), TableKind::Price)?;
        Self::new(df, report)
    }

    /// Normalizes an in-memory frame with the same rules as [`PriceTable::load`].
    pub fn from_frame(raw: DataFrame) -> StockscopeResult<Self> {
        let (df, report) = normalize(raw, TableKind::Price, "prices")?;
        Self::new(df, report)
    }

    /// Unique tickers in order of first appearance.
    pub fn tickers(&self) -> StockscopeResult<Vec<Ticker>> {
        self.df
            .str_ca(TableCol::Ticker)?
            .into_iter()
            .flatten()
            .unique()
            .map(Ticker::new)
            .collect()
    }

    /// Earliest and latest date, `None` for an empty table.
    pub fn date_bounds(&self) -> StockscopeResult<Option<DateRange>> {
        date_bounds(&self.df)
    }

    /// First and last calendar year, `None` for an empty table.
    pub fn year_bounds(&self) -> StockscopeResult<Option<YearRange>> {
        Ok(self.date_bounds()?.map(YearRange::spanning))
    }

    /// The first `n` rows in date order.
    pub fn head(&self, n: usize) -> DataFrame {
        self.df.head(Some(n))
    }

    /// Rows of all tickers dated inside `years`, in date order.
    pub fn filter_years(&self, years: YearRange) -> StockscopeResult<DataFrame> {
        filter_years(&self.df, years)
    }

    fn new(df: DataFrame, report: LoadReport) -> StockscopeResult<Self> {
        ensure_sorted(&df)?;
        Ok(Self { df, report })
    }
}

// ================================================================================================
// Anomaly Table
// ================================================================================================

/// Anomaly flags per (Ticker, Date), one 0/1 column per model.
///
/// The key is not unique: loosely merged sources may repeat it.
#[derive(Debug, Clone)]
pub struct AnomalyTable {
    df: DataFrame,
    report: LoadReport,
}

impl Table for AnomalyTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn load_report(&self) -> LoadReport {
        self.report
    }
}

impl AnomalyTable {
    pub fn load(path: impl AsRef<Path>) -> StockscopeResult<Self> {
        let (df, report) = load_table(path.as_ref(), TableKind::Anomaly)?;
        Self::new(df, report)
    }

    /// Normalizes an in-memory frame with the same rules as [`AnomalyTable::load`].
    pub fn from_frame(raw: DataFrame) -> StockscopeResult<Self> {
        let (df, report) = normalize(raw, TableKind::Anomaly, "anomalies")?;
        Self::new(df, report)
    }

    /// Rows of `ticker` inside `range` that `model` flags as anomalies.
    pub fn filter_flagged(
        &self,
        range: DateRange,
        ticker: &Ticker,
        model: &ModelLabel,
    ) -> StockscopeResult<FilteredSubset> {
        self.filter(range, ticker)?.flagged_by(model)
    }

    /// Numeric columns that can serve as model flags, in column order.
    /// Matcher output columns (`*_match`) are excluded.
    pub fn models(&self) -> Vec<ModelLabel> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|n| n.as_str())
            .filter(|n| *n != TableCol::Ticker.as_str() && *n != TableCol::Date.as_str())
            .filter(|n| !n.ends_with(MATCH_SUFFIX))
            .filter(|n| self.df.has_numeric_column(n))
            .filter_map(|n| ModelLabel::new(n).ok())
            .collect()
    }

    pub(crate) fn new(df: DataFrame, report: LoadReport) -> StockscopeResult<Self> {
        ensure_sorted(&df)?;
        Ok(Self { df, report })
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn ensure_sorted(df: &DataFrame) -> StockscopeResult<()> {
    let dates = df.date_values(TableCol::Date)?;
    if dates.iter().any(Option::is_none) {
        return Err(SystemError::InvariantViolation("table contains null dates".to_string()).into());
    }
    if !dates.windows(2).all(|w| w[0] <= w[1]) {
        return Err(DataError::DataFrame("table must be sorted by Date".to_string()).into());
    }
    Ok(())
}

fn date_bounds(df: &DataFrame) -> StockscopeResult<Option<DateRange>> {
    let column = df
        .column(TableCol::Date.as_str())
        .map_err(|_| DataError::DataFrame("Failed to get column Date".to_string()))?;
    let physical = column
        .date()
        .map_err(|_| DataError::DataFrame("Column Date is not Date".to_string()))?
        .physical();

    let bounds = physical
        .min()
        .zip(physical.max())
        .and_then(|(lo, hi)| days_to_date(lo).zip(days_to_date(hi)));

    bounds
        .map(|(start, end)| DateRange::new(start, end))
        .transpose()
}
