use std::collections::HashMap;

use chrono::NaiveDate;
use polars::frame::DataFrame;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    data::{polars_ext::DataFrameExt, schema::TableCol},
    error::StockscopeResult,
};

/// One (date, price) coordinate handed to the chart layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub adj_close: f64,
}

/// Which side of a two-model comparison a marker belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MarkerCategory {
    OnlyA,
    OnlyB,
    Both,
}

/// Anomaly markers of one category, priced on the price series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSeries {
    pub category: MarkerCategory,
    pub points: Vec<PricePoint>,
}

/// The price line of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

/// Splits mixed-ticker points into one series per ticker. Series appear in
/// order of first appearance and keep the input order of their points.
pub fn series_by_ticker(points: Vec<PricePoint>) -> Vec<TickerSeries> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut series: Vec<TickerSeries> = Vec::new();

    for point in points {
        let slot = *index.entry(point.ticker.clone()).or_insert_with(|| {
            series.push(TickerSeries {
                ticker: point.ticker.clone(),
                points: Vec::new(),
            });
            series.len() - 1
        });
        series[slot].points.push(point);
    }
    series
}

/// Extracts the price line of a normalized price frame, in row order.
/// Rows with a missing value in any of the three columns are skipped.
pub fn price_points(df: &DataFrame) -> StockscopeResult<Vec<PricePoint>> {
    let tickers = df.str_ca(TableCol::Ticker)?;
    let dates = df.date_values(TableCol::Date)?;
    let closes = df.f64_ca(TableCol::AdjClose)?;

    Ok(tickers
        .into_iter()
        .zip(dates)
        .zip(closes)
        .filter_map(|((ticker, date), close)| {
            Some(PricePoint {
                ticker: ticker?.to_string(),
                date: date?,
                adj_close: close?,
            })
        })
        .collect())
}
