use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use polars::{
    frame::DataFrame,
    prelude::{
        Column, DataType, IntoColumn, LazyCsvReader, LazyFileListReader, NamedFrom, PlPath,
        PlSmallStr, Series, SortMultipleOptions, StringChunked,
    },
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::{
    data::{
        polars_ext::{DataFrameExt, date_to_days, polars_to_stockscope_error},
        schema::TableCol,
    },
    error::{DataError, IoError, StockscopeResult},
};

/// Date-only layouts accepted in the `Date` column, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Date-time layouts; the time of day is discarded.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// The two table shapes the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TableKind {
    /// `Ticker`, `Date`, `Adj Close`, optionally `Volume` and `Return`.
    Price,
    /// `Ticker`, `Date` and any number of 0/1 model flag columns.
    Anomaly,
}

impl TableKind {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Price => &["Ticker", "Date", "Adj Close"],
            Self::Anomaly => &["Ticker", "Date"],
        }
    }

    /// Columns whose unparseable values cause the row to be dropped.
    fn mandatory_values(&self) -> &'static [TableCol] {
        match self {
            Self::Price => &[TableCol::Date, TableCol::AdjClose],
            Self::Anomaly => &[TableCol::Date],
        }
    }
}

/// Row accounting of a single load.
///
/// Rows with an invalid date (or, for price tables, an invalid adjusted
/// close) are excluded from the table rather than failing the load. This
/// report makes that loss visible to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Data rows found in the source (header excluded).
    pub rows_read: usize,
    /// Rows excluded because of an unparseable mandatory value.
    pub rows_dropped: usize,
}

impl LoadReport {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_dropped
    }
}

/// Reads a CSV file and normalizes it (see [`normalize`]).
///
/// # Errors
/// - [`IoError::SourceNotFound`] if `path` does not exist.
/// - [`DataError::Schema`] if a required column is missing after trimming
///   the header names.
#[tracing::instrument(skip_all, fields(path = %path.display(), kind = %kind))]
pub fn load_table(path: &Path, kind: TableKind) -> StockscopeResult<(DataFrame, LoadReport)> {
    if !path.exists() {
        return Err(IoError::SourceNotFound(path.to_path_buf()).into());
    }

    let uri = path.to_str().ok_or_else(|| {
        IoError::FileSystem(format!(
            "Path contains invalid UTF-8 characters: {}",
            path.display()
        ))
    })?;

    // Every column is read as a string, parsing happens in `normalize`.
    let raw = LazyCsvReader::new(PlPath::new(uri))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| IoError::ReadFailed(format!("{}: {e}", path.display())))?;

    let table = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| uri.to_string());

    let (df, report) = normalize(raw, kind, &table)?;

    if report.rows_dropped > 0 {
        warn!(
            table = %table,
            dropped = report.rows_dropped,
            "Rows with invalid dates or prices were excluded"
        );
    }
    info!(table = %table, rows = df.height(), "Table loaded");

    Ok((df, report))
}

/// Normalizes a raw frame in place of a freshly read CSV:
///
/// 1. trims whitespace from every column name,
/// 2. parses `Date` leniently (unparseable values become null),
/// 3. for price tables coerces `Adj Close` to `f64` leniently,
/// 4. drops rows with a null mandatory value,
/// 5. sorts ascending by `Date`, keeping file order among equal dates.
///
/// All remaining columns are narrowed to Int64 or Float64 when every
/// non-empty value parses as such, so model flags become integers.
pub(crate) fn normalize(
    mut df: DataFrame,
    kind: TableKind,
    table: &str,
) -> StockscopeResult<(DataFrame, LoadReport)> {
    trim_column_names(&mut df, table)?;
    df.require_columns(table, kind.required_columns())?;

    let rows_read = df.height();
    let names = df.get_column_names_owned();

    for name in names {
        let raw = as_strings(&df, &name)?;
        let parsed = match name.as_str() {
            n if n == TableCol::Date.as_str() => parse_date_column(name.clone(), &raw)?,
            n if n == TableCol::AdjClose.as_str() && kind == TableKind::Price => {
                parse_f64_column(name.clone(), &raw)
            }
            n if n == TableCol::Ticker.as_str() => raw.into_column(),
            _ => refine_column(name.clone(), &raw),
        };
        df.with_column(parsed)
            .map_err(|e| polars_to_stockscope_error("Failed to replace column", e))?;
    }

    let mut mask = df
        .column(TableCol::Date.as_str())
        .map_err(|e| polars_to_stockscope_error("Failed to get Date column", e))?
        .is_not_null();
    for col in &kind.mandatory_values()[1..] {
        let valid = df
            .column(col.as_str())
            .map_err(|e| polars_to_stockscope_error("Failed to get column", e))?
            .is_not_null();
        mask = &mask & &valid;
    }

    let sorted = df
        .filter(&mask)
        .and_then(|kept| {
            kept.sort(
                [TableCol::Date.as_str()],
                SortMultipleOptions::default().with_maintain_order(true),
            )
        })
        .map_err(|e| polars_to_stockscope_error("Failed to filter and sort table", e))?;

    let report = LoadReport {
        rows_read,
        rows_dropped: rows_read - sorted.height(),
    };
    debug!(table = %table, ?report, "Table normalized");

    Ok((sorted, report))
}

// ================================================================================================
// Helper Functions
// ================================================================================================

fn trim_column_names(df: &mut DataFrame, table: &str) -> StockscopeResult<()> {
    let renames = df
        .get_column_names()
        .iter()
        .map(|n| (n.to_string(), n.trim().to_string()))
        .collect::<Vec<_>>();

    if let Some(dup) = renames.iter().map(|(_, trimmed)| trimmed).duplicates().next() {
        return Err(DataError::Schema {
            table: table.to_string(),
            msg: format!("column '{dup}' appears more than once after trimming header names"),
        }
        .into());
    }

    for (original, trimmed) in renames.into_iter().filter(|(o, t)| o != t) {
        df.rename(&original, PlSmallStr::from(trimmed))
            .map_err(|e| polars_to_stockscope_error("Failed to rename column", e))?;
    }
    Ok(())
}

fn as_strings(df: &DataFrame, name: &str) -> StockscopeResult<StringChunked> {
    let column = df
        .column(name)
        .map_err(|e| polars_to_stockscope_error("Failed to get column", e))?;
    let as_str = column
        .cast(&DataType::String)
        .map_err(|e| polars_to_stockscope_error("Failed to cast column to String", e))?;
    as_str
        .str()
        .cloned()
        .map_err(|e| polars_to_stockscope_error("Column is not String", e))
}

fn parse_date_column(name: PlSmallStr, raw: &StringChunked) -> StockscopeResult<Column> {
    let days = raw
        .into_iter()
        .map(|v| v.and_then(parse_date).and_then(date_to_days))
        .collect::<Vec<Option<i32>>>();

    Series::new(name, days)
        .cast(&DataType::Date)
        .map(|s| s.into_column())
        .map_err(|e| polars_to_stockscope_error("Failed to build Date column", e))
}

fn parse_f64_column(name: PlSmallStr, raw: &StringChunked) -> Column {
    let values = raw
        .into_iter()
        .map(|v| v.and_then(parse_f64))
        .collect::<Vec<Option<f64>>>();
    Series::new(name, values).into_column()
}

/// Narrows a string column to Int64 or Float64 when all its non-empty
/// values parse; otherwise the column is kept as is.
fn refine_column(name: PlSmallStr, raw: &StringChunked) -> Column {
    let present = raw
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();

    if present.iter().all(|v| v.parse::<i64>().is_ok()) {
        let values = raw
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<i64>().ok()))
            .collect::<Vec<Option<i64>>>();
        return Series::new(name, values).into_column();
    }

    if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        let values = raw
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect::<Vec<Option<f64>>>();
        return Series::new(name, values).into_column();
    }

    raw.clone().into_column()
}

/// Lenient date parser. Returns `None` instead of failing.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Lenient float parser. NaN counts as missing.
pub(crate) fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}
