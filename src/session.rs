use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    anomaly::overlap::partition,
    config::DashboardConfig,
    data::{
        domain::{DateRange, KnownModel, ModelLabel, Ticker, YearRange},
        table::{AnomalyTable, PriceTable, Table},
    },
    error::StockscopeResult,
    report::points::{
        MarkerCategory, MarkerSeries, PricePoint, TickerSeries, price_points, series_by_ticker,
    },
};

/// User input of one dashboard query: a ticker and a closed date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub ticker: Ticker,
    pub range: DateRange,
}

impl Selection {
    /// # Errors
    /// [`crate::error::QueryError::InvertedRange`] if `start > end`.
    pub fn new(ticker: Ticker, start: NaiveDate, end: NaiveDate) -> StockscopeResult<Self> {
        Ok(Self {
            ticker,
            range: DateRange::new(start, end)?,
        })
    }
}

/// The price line of a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceView {
    pub selection: Selection,
    pub prices: Vec<PricePoint>,
}

impl PriceView {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Two models' anomalies over the price line of a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub selection: Selection,
    pub model_a: ModelLabel,
    pub model_b: ModelLabel,
    pub prices: Vec<PricePoint>,
    /// Marker series in `only_a`, `only_b`, `both` order.
    pub markers: Vec<MarkerSeries>,
}

impl Comparison {
    /// No price data means nothing can be drawn, markers included.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn markers(&self, category: MarkerCategory) -> &[PricePoint] {
        self.markers
            .iter()
            .find(|m| m.category == category)
            .map(|m| m.points.as_slice())
            .unwrap_or_default()
    }
}

/// Rows shown ahead of the multi-ticker chart.
pub const PREVIEW_ROWS: usize = 5;

/// All tickers' price lines over a range of years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceOverview {
    pub years: YearRange,
    /// Year span of the whole price table, the default selection.
    pub bounds: Option<YearRange>,
    /// The first rows of the price table in date order.
    pub preview: Vec<PricePoint>,
    /// One series per ticker, in order of first appearance.
    pub series: Vec<TickerSeries>,
}

impl PriceOverview {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Read-only query surface over the loaded tables.
///
/// Tables are loaded once and shared; every query is a pure function of
/// the tables and its inputs, so a `Session` can be cloned across threads.
#[derive(Debug, Clone)]
pub struct Session {
    prices: Arc<PriceTable>,
    anomalies: Arc<AnomalyTable>,
    models: Vec<ModelLabel>,
}

impl Session {
    pub fn new(prices: PriceTable, anomalies: AnomalyTable) -> Self {
        Self {
            prices: Arc::new(prices),
            anomalies: Arc::new(anomalies),
            models: KnownModel::selectable(),
        }
    }

    /// Loads both tables named in `cfg`.
    #[tracing::instrument(skip_all, fields(prices = %cfg.price_table.display(), anomalies = %cfg.anomaly_table.display()))]
    pub fn open(cfg: &DashboardConfig) -> StockscopeResult<Self> {
        let prices = PriceTable::load(&cfg.price_table)?;
        let anomalies = AnomalyTable::load(&cfg.anomaly_table)?;

        let available = anomalies.models();
        for model in cfg.models.iter().filter(|m| !available.contains(m)) {
            warn!(model = %model, "Configured model has no flag column in the anomaly table");
        }

        info!(
            price_rows = prices.len(),
            anomaly_rows = anomalies.len(),
            "Session opened"
        );
        Ok(Self::new(prices, anomalies).with_models(cfg.models.clone()))
    }

    pub fn with_models(self, models: Vec<ModelLabel>) -> Self {
        Self { models, ..self }
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn anomalies(&self) -> &AnomalyTable {
        &self.anomalies
    }

    /// Selectable model labels, in display order.
    pub fn models(&self) -> &[ModelLabel] {
        &self.models
    }

    /// Tickers of the price table in order of first appearance.
    pub fn tickers(&self) -> StockscopeResult<Vec<Ticker>> {
        self.prices.tickers()
    }

    pub fn date_bounds(&self) -> StockscopeResult<Option<DateRange>> {
        self.prices.date_bounds()
    }

    /// First and last year of the price table.
    pub fn year_bounds(&self) -> StockscopeResult<Option<YearRange>> {
        self.prices.year_bounds()
    }

    /// Price lines of every ticker dated inside `years`.
    #[tracing::instrument(skip(self), fields(years = %years))]
    pub fn overview(&self, years: YearRange) -> StockscopeResult<PriceOverview> {
        let rows = self.prices.filter_years(years)?;
        let series = series_by_ticker(price_points(&rows)?);

        if series.is_empty() {
            info!("No price data for selected years");
        }

        Ok(PriceOverview {
            years,
            bounds: self.year_bounds()?,
            preview: price_points(&self.prices.head(PREVIEW_ROWS))?,
            series,
        })
    }

    /// The initial selection: first ticker over the full date range.
    /// `None` if the price table is empty.
    pub fn default_selection(&self) -> StockscopeResult<Option<Selection>> {
        let ticker = self.tickers()?.into_iter().next();
        let range = self.date_bounds()?;
        Ok(ticker
            .zip(range)
            .map(|(ticker, range)| Selection { ticker, range }))
    }

    /// The first two selectable models, if there are that many.
    pub fn default_models(&self) -> Option<(ModelLabel, ModelLabel)> {
        match self.models.as_slice() {
            [a, b, ..] => Some((a.clone(), b.clone())),
            _ => None,
        }
    }

    #[tracing::instrument(skip(self), fields(ticker = %selection.ticker, range = %selection.range))]
    pub fn price_view(&self, selection: &Selection) -> StockscopeResult<PriceView> {
        let subset = self.prices.filter(selection.range, &selection.ticker)?;
        let prices = price_points(subset.as_df())?;

        if prices.is_empty() {
            info!("No price data for selection");
        }

        Ok(PriceView {
            selection: selection.clone(),
            prices,
        })
    }

    /// Partitions the anomalies flagged by `model_a` and `model_b` into
    /// only-A, only-B and both, and places each key on the price line.
    ///
    /// # Errors
    /// A schema error if either model has no numeric flag column.
    #[tracing::instrument(skip(self), fields(ticker = %selection.ticker, range = %selection.range))]
    pub fn compare(
        &self,
        selection: &Selection,
        model_a: &ModelLabel,
        model_b: &ModelLabel,
    ) -> StockscopeResult<Comparison> {
        let Selection { ticker, range } = selection;

        let price_subset = self.prices.filter(*range, ticker)?;
        let flagged_a = self.anomalies.filter_flagged(*range, ticker, model_a)?;
        let flagged_b = self.anomalies.filter_flagged(*range, ticker, model_b)?;

        let split = partition(&flagged_a, &flagged_b)?;
        let markers = vec![
            MarkerSeries {
                category: MarkerCategory::OnlyA,
                points: split.only_a.priced(&price_subset)?,
            },
            MarkerSeries {
                category: MarkerCategory::OnlyB,
                points: split.only_b.priced(&price_subset)?,
            },
            MarkerSeries {
                category: MarkerCategory::Both,
                points: split.both.priced(&price_subset)?,
            },
        ];

        let unpriced = split.only_a.len() + split.only_b.len() + split.both.len()
            - markers.iter().map(|m| m.points.len()).sum::<usize>();
        if unpriced > 0 {
            warn!(unpriced, "Anomalies without a price row are not rendered");
        }

        Ok(Comparison {
            selection: selection.clone(),
            model_a: model_a.clone(),
            model_b: model_b.clone(),
            prices: price_points(price_subset.as_df())?,
            markers,
        })
    }
}
