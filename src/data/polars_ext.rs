use chrono::{Duration, NaiveDate};
use polars::prelude::{DataFrame, DataType, Float64Chunked, PolarsError, StringChunked};

use crate::{
    data::schema::TableCol,
    error::{DataError, StockscopeError, StockscopeResult},
};

pub(crate) fn polars_to_stockscope_error(context: &str, e: PolarsError) -> StockscopeError {
    DataError::DataFrame(format!("{context}: {e}")).into()
}

const UNIX_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

/// Days since the Unix epoch, the physical representation of a polars `Date`.
/// `None` if the offset does not fit the `i32` physical type.
pub(crate) fn date_to_days(date: NaiveDate) -> Option<i32> {
    i32::try_from((date - UNIX_EPOCH).num_days()).ok()
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    UNIX_EPOCH.checked_add_signed(Duration::days(i64::from(days)))
}

pub trait DataFrameExt {
    /// Fails with a schema error naming `table` if any column is absent.
    fn require_columns(&self, table: &str, cols: &[&str]) -> StockscopeResult<()>;
    fn str_ca(&self, col: TableCol) -> StockscopeResult<&StringChunked>;
    fn f64_ca(&self, col: TableCol) -> StockscopeResult<&Float64Chunked>;
    fn date_values(&self, col: TableCol) -> StockscopeResult<Vec<Option<NaiveDate>>>;
    fn has_numeric_column(&self, name: &str) -> bool;
}

impl DataFrameExt for DataFrame {
    fn require_columns(&self, table: &str, cols: &[&str]) -> StockscopeResult<()> {
        let schema = self.schema();
        match cols.iter().find(|name| !schema.contains(name)) {
            Some(missing) => Err(DataError::missing_column(table, missing).into()),
            None => Ok(()),
        }
    }

    fn str_ca(&self, col: TableCol) -> StockscopeResult<&StringChunked> {
        self.column(col.as_str())
            .map_err(|_| DataError::DataFrame(format!("Failed to get column {col:?}")).into())
            .and_then(|s| {
                s.str().map_err(|_| {
                    DataError::DataFrame(format!("Column {col:?} is not String")).into()
                })
            })
    }

    fn f64_ca(&self, col: TableCol) -> StockscopeResult<&Float64Chunked> {
        self.column(col.as_str())
            .map_err(|_| DataError::DataFrame(format!("Failed to get column {col:?}")).into())
            .and_then(|s| {
                s.f64().map_err(|_| {
                    DataError::DataFrame(format!("Column {col:?} is not Float64")).into()
                })
            })
    }

    fn date_values(&self, col: TableCol) -> StockscopeResult<Vec<Option<NaiveDate>>> {
        let s = self
            .column(col.as_str())
            .map_err(|_| DataError::DataFrame(format!("Failed to get column {col:?}")))?;
        let ca = s
            .date()
            .map_err(|_| DataError::DataFrame(format!("Column {col:?} is not Date")))?;

        Ok(ca
            .physical()
            .into_iter()
            .map(|opt| opt.and_then(days_to_date))
            .collect())
    }

    fn has_numeric_column(&self, name: &str) -> bool {
        matches!(
            self.schema().get(name),
            Some(
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64
                    | DataType::Float32
                    | DataType::Float64
            )
        )
    }
}
