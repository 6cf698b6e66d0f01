use polars::{
    frame::DataFrame,
    prelude::{IntoLazy, col, lit},
};

use crate::{
    data::{
        domain::{DateRange, ModelLabel, Ticker, YearRange},
        polars_ext::{DataFrameExt, polars_to_stockscope_error},
        schema::TableCol,
    },
    error::{DataError, StockscopeResult},
};

/// A query-scoped view of a table, constrained to one ticker and a closed
/// date range.
///
/// Rows keep the order of the source table, which is ascending by date.
/// An empty subset is a valid result and means "no data for this
/// selection".
#[derive(Debug, Clone)]
pub struct FilteredSubset {
    df: DataFrame,
    ticker: Ticker,
    range: DateRange,
}

impl FilteredSubset {
    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Narrows the subset to rows flagged as anomalies by `model`
    /// (flag column equal to 1).
    ///
    /// # Errors
    /// [`DataError::Schema`] if `model` has no flag column or the column is
    /// not numeric. This is a configuration mismatch and must not be
    /// confused with an empty result.
    pub fn flagged_by(&self, model: &ModelLabel) -> StockscopeResult<FilteredSubset> {
        let name = model.as_str();
        let table = format!("subset of {}", self.ticker);
        self.df.require_columns(&table, &[name])?;

        if !self.df.has_numeric_column(name) {
            return Err(DataError::Schema {
                table,
                msg: format!("flag column '{name}' is not numeric"),
            }
            .into());
        }

        let df = self
            .df
            .clone()
            .lazy()
            .filter(col(name).eq(lit(1)))
            .collect()
            .map_err(|e| polars_to_stockscope_error("Failed to filter by model flag", e))?;

        Ok(Self {
            df,
            ticker: self.ticker.clone(),
            range: self.range,
        })
    }
}

/// Selects the rows of `df` with `Date` in `range` (inclusive on both ends)
/// and `Ticker` equal to `ticker`.
///
/// The range is already validated by [`DateRange::new`]; this function
/// never rejects a query.
pub fn filter(df: &DataFrame, range: DateRange, ticker: &Ticker) -> StockscopeResult<FilteredSubset> {
    df.require_columns("table", &[TableCol::Ticker.as_str(), TableCol::Date.as_str()])?;

    let predicate = col(TableCol::Date)
        .gt_eq(lit(range.start()))
        .and(col(TableCol::Date).lt_eq(lit(range.end())))
        .and(col(TableCol::Ticker).eq(lit(ticker.as_str())));

    let subset = df
        .clone()
        .lazy()
        .filter(predicate)
        .collect()
        .map_err(|e| polars_to_stockscope_error("Failed to apply range/key filter", e))?;

    Ok(FilteredSubset {
        df: subset,
        ticker: ticker.clone(),
        range,
    })
}

/// Selects the rows of every ticker whose `Date` falls in a year of
/// `years`. The `Ticker` column is kept so callers can split the result
/// into one series per ticker.
pub fn filter_years(df: &DataFrame, years: YearRange) -> StockscopeResult<DataFrame> {
    df.require_columns("table", &[TableCol::Date.as_str()])?;

    let year = col(TableCol::Date).dt().year();
    let predicate = year
        .clone()
        .gt_eq(lit(years.start()))
        .and(year.lt_eq(lit(years.end())));

    df.clone()
        .lazy()
        .filter(predicate)
        .collect()
        .map_err(|e| polars_to_stockscope_error("Failed to apply year filter", e))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use polars::df;

    use super::*;
    use crate::data::loader::{TableKind, normalize};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn prices() -> DataFrame {
        let raw = df![
            "Ticker" => &["AAA", "AAA", "BBB", "AAA", "aaa"],
            "Date" => &["2023-01-01", "2023-01-03", "2023-01-02", "2023-01-04", "2023-01-02"],
            "Adj Close" => &["10.0", "12.0", "5.0", "13.0", "99.0"]
        ]
        .expect("Failed to create mock DF");
        normalize(raw, TableKind::Price, "prices")
            .expect("normalize failed")
            .0
    }

    fn anomalies() -> DataFrame {
        let raw = df![
            "Ticker" => &["AAA", "AAA", "AAA", "BBB"],
            "Date" => &["2023-01-01", "2023-01-03", "2023-01-05", "2023-01-03"],
            "svm" => &["1", "0", "1", "1"],
            "note" => &["a", "b", "c", "d"]
        ]
        .expect("Failed to create mock DF");
        normalize(raw, TableKind::Anomaly, "anomalies")
            .expect("normalize failed")
            .0
    }

    #[test]
    fn test_filter_selects_ticker_and_closed_range() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 3)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();

        let subset = filter(&prices(), range, &ticker).expect("filter failed");

        assert_eq!(subset.len(), 2);
        assert_eq!(
            subset.as_df().date_values(TableCol::Date).unwrap(),
            vec![Some(date(2023, 1, 1)), Some(date(2023, 1, 3))]
        );
        let tickers = subset
            .as_df()
            .str_ca(TableCol::Ticker)
            .unwrap()
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        assert_eq!(tickers, vec!["AAA", "AAA"]);
    }

    #[test]
    fn test_filter_returns_every_qualifying_row_once() {
        let df = prices();
        let range = DateRange::new(date(2023, 1, 2), date(2023, 1, 4)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();

        let subset = filter(&df, range, &ticker).unwrap();

        let dates = df.date_values(TableCol::Date).unwrap();
        let tickers = df.str_ca(TableCol::Ticker).unwrap();
        let expected = dates
            .iter()
            .zip(tickers.into_iter())
            .filter(|(d, t)| d.is_some_and(|d| range.contains(d)) && *t == Some("AAA"))
            .count();

        assert_eq!(subset.len(), expected);
        assert!(
            subset
                .as_df()
                .date_values(TableCol::Date)
                .unwrap()
                .into_iter()
                .all(|d| d.is_some_and(|d| range.contains(d)))
        );
    }

    #[test]
    fn test_filter_empty_selection_is_not_an_error() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();

        let subset = filter(&prices(), range, &ticker).expect("empty result is valid");
        assert!(subset.is_empty());

        let unknown = Ticker::new("ZZZ").unwrap();
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 4)).unwrap();
        assert!(filter(&prices(), range, &unknown).unwrap().is_empty());
    }

    #[test]
    fn test_flagged_by_keeps_only_anomalies() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();
        let subset = filter(&anomalies(), range, &ticker).unwrap();
        assert_eq!(subset.len(), 3);

        let svm = ModelLabel::new("svm").unwrap();
        let flagged = subset.flagged_by(&svm).expect("svm column exists");
        assert_eq!(
            flagged.as_df().date_values(TableCol::Date).unwrap(),
            vec![Some(date(2023, 1, 1)), Some(date(2023, 1, 5))]
        );
    }

    #[test]
    fn test_flagged_by_unknown_model_is_schema_error() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();
        let subset = filter(&anomalies(), range, &ticker).unwrap();

        let err = subset
            .flagged_by(&ModelLabel::new("isolation tree").unwrap())
            .expect_err("no such flag column");
        assert!(err.is_schema_error());

        let err = subset
            .flagged_by(&ModelLabel::new("note").unwrap())
            .expect_err("string column is not a flag");
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_filter_years_keeps_all_tickers_in_closed_year_range() {
        let raw = df![
            "Ticker" => &["AAA", "BBB", "AAA", "CCC", "BBB"],
            "Date" => &["2021-12-31", "2022-01-01", "2022-06-15", "2023-12-31", "2024-01-01"],
            "Adj Close" => &["1", "2", "3", "4", "5"]
        ]
        .expect("Failed to create mock DF");
        let (df, _) = normalize(raw, TableKind::Price, "prices").unwrap();

        let years = YearRange::new(2022, 2023).unwrap();
        let kept = filter_years(&df, years).expect("year filter failed");

        assert_eq!(
            kept.date_values(TableCol::Date).unwrap(),
            vec![
                Some(date(2022, 1, 1)),
                Some(date(2022, 6, 15)),
                Some(date(2023, 12, 31))
            ]
        );
        let tickers = kept
            .str_ca(TableCol::Ticker)
            .unwrap()
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        assert_eq!(tickers, vec!["BBB", "AAA", "CCC"]);

        let none = filter_years(&df, YearRange::new(2030, 2031).unwrap()).unwrap();
        assert_eq!(none.height(), 0);
    }
}
