use std::collections::HashMap;

use chrono::NaiveDate;
use polars::{
    frame::{DataFrame, UniqueKeepStrategy},
    prelude::{IntoLazy, JoinArgs, JoinType, LazyFrame, SortMultipleOptions, col, lit},
};

use crate::{
    data::{
        domain::Ticker,
        filter::FilteredSubset,
        polars_ext::{DataFrameExt, polars_to_stockscope_error},
        schema::TableCol,
    },
    error::StockscopeResult,
    report::points::{PricePoint, price_points},
};

const PRESENT: &str = "__present";

/// A single anomaly occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnomalyKey {
    pub ticker: Ticker,
    pub date: NaiveDate,
}

/// Distinct (Ticker, Date) keys, ordered by date then ticker.
#[derive(Debug, Clone)]
pub struct KeySet {
    df: DataFrame,
}

impl KeySet {
    /// Projects `subset` onto its key columns and removes duplicates.
    pub fn from_subset(subset: &FilteredSubset) -> StockscopeResult<Self> {
        Self::from_lazy(keys_of(subset))
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn keys(&self) -> StockscopeResult<Vec<AnomalyKey>> {
        let tickers = self.df.str_ca(TableCol::Ticker)?;
        let dates = self.df.date_values(TableCol::Date)?;

        tickers
            .into_iter()
            .zip(dates)
            .filter_map(|(t, d)| t.zip(d))
            .map(|(ticker, date)| {
                Ok(AnomalyKey {
                    ticker: Ticker::new(ticker)?,
                    date,
                })
            })
            .collect()
    }

    /// Places each key at the `Adj Close` of its first price row.
    ///
    /// Keys without a price row in `prices` are dropped.
    pub fn priced(&self, prices: &FilteredSubset) -> StockscopeResult<Vec<PricePoint>> {
        let mut first_close: HashMap<(String, NaiveDate), f64> = HashMap::new();
        for point in price_points(prices.as_df())? {
            first_close
                .entry((point.ticker, point.date))
                .or_insert(point.adj_close);
        }

        Ok(self
            .keys()?
            .into_iter()
            .filter_map(|key| {
                let ticker = key.ticker.as_str().to_string();
                first_close
                    .get(&(ticker.clone(), key.date))
                    .map(|&adj_close| PricePoint {
                        ticker,
                        date: key.date,
                        adj_close,
                    })
            })
            .collect())
    }

    fn from_lazy(lf: LazyFrame) -> StockscopeResult<Self> {
        let df = lf
            .sort(
                [TableCol::Date, TableCol::Ticker],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()
            .map_err(|e| polars_to_stockscope_error("Failed to build key set", e))?;
        Ok(Self { df })
    }
}

/// The three-way split of two anomaly subsets.
///
/// `only_a`, `only_b` and `both` are pairwise disjoint and together cover
/// every key that occurs in either input.
#[derive(Debug, Clone)]
pub struct Partition {
    pub only_a: KeySet,
    pub only_b: KeySet,
    pub both: KeySet,
}

/// Keys present in both `a` and `b`.
pub fn overlap(a: &FilteredSubset, b: &FilteredSubset) -> StockscopeResult<KeySet> {
    KeySet::from_lazy(keys_of(a).join(
        keys_of(b),
        TableCol::key().map(col),
        TableCol::key().map(col),
        JoinArgs::new(JoinType::Inner),
    ))
}

/// Splits the keys of `a` and `b` into exclusive and shared sets.
#[tracing::instrument(skip_all, fields(ticker = %a.ticker(), a = a.len(), b = b.len()))]
pub fn partition(a: &FilteredSubset, b: &FilteredSubset) -> StockscopeResult<Partition> {
    let partition = Partition {
        only_a: KeySet::from_lazy(exclusive(keys_of(a), keys_of(b)))?,
        only_b: KeySet::from_lazy(exclusive(keys_of(b), keys_of(a)))?,
        both: overlap(a, b)?,
    };

    tracing::debug!(
        only_a = partition.only_a.len(),
        only_b = partition.only_b.len(),
        both = partition.both.len(),
        "Partitioned anomaly keys"
    );

    Ok(partition)
}

fn keys_of(subset: &FilteredSubset) -> LazyFrame {
    subset
        .as_df()
        .clone()
        .lazy()
        .select(TableCol::key().map(col))
        .unique(None, UniqueKeepStrategy::Any)
}

/// Keys of `keep` that do not occur in `other`.
fn exclusive(keep: LazyFrame, other: LazyFrame) -> LazyFrame {
    keep.join(
        other.with_column(lit(true).alias(PRESENT)),
        TableCol::key().map(col),
        TableCol::key().map(col),
        JoinArgs {
            how: JoinType::Left,
            ..Default::default()
        },
    )
    .filter(col(PRESENT).is_null())
    .select(TableCol::key().map(col))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use polars::df;

    use super::*;
    use crate::data::{
        domain::{DateRange, ModelLabel},
        table::{AnomalyTable, PriceTable, Table},
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn table() -> AnomalyTable {
        let raw = df![
            "Ticker" => &["AAA", "AAA", "AAA", "AAA", "AAA", "BBB"],
            "Date" => &["2023-01-01", "2023-01-02", "2023-01-02", "2023-01-03", "2023-01-04", "2023-01-02"],
            "svm" => &["1", "1", "1", "0", "1", "1"],
            "dbscan" => &["0", "1", "1", "1", "1", "0"]
        ]
        .expect("Failed to create mock DF");
        AnomalyTable::from_frame(raw).expect("Failed to normalize anomalies")
    }

    fn flagged(range: DateRange, model: &str) -> FilteredSubset {
        table()
            .filter_flagged(range, &Ticker::new("AAA").unwrap(), &ModelLabel::new(model).unwrap())
            .expect("flag column exists")
    }

    fn key_set(set: &KeySet) -> BTreeSet<AnomalyKey> {
        set.keys().unwrap().into_iter().collect()
    }

    fn key(d: u32) -> AnomalyKey {
        AnomalyKey {
            ticker: Ticker::new("AAA").unwrap(),
            date: date(2023, 1, d),
        }
    }

    fn full_range() -> DateRange {
        DateRange::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap()
    }

    #[test]
    fn test_overlap_is_symmetric_and_deduplicated() {
        let svm = flagged(full_range(), "svm");
        let dbscan = flagged(full_range(), "dbscan");

        let ab = overlap(&svm, &dbscan).unwrap();
        let ba = overlap(&dbscan, &svm).unwrap();

        assert_eq!(key_set(&ab), key_set(&ba));
        assert_eq!(ab.keys().unwrap(), vec![key(2), key(4)]);
    }

    #[test]
    fn test_overlap_with_self_is_distinct_keys() {
        let svm = flagged(full_range(), "svm");
        let own = overlap(&svm, &svm).unwrap();
        assert_eq!(own.keys().unwrap(), vec![key(1), key(2), key(4)]);
        assert_eq!(
            key_set(&own),
            key_set(&KeySet::from_subset(&svm).unwrap())
        );
    }

    #[test]
    fn test_partition_is_disjoint_and_covering() {
        let svm = flagged(full_range(), "svm");
        let dbscan = flagged(full_range(), "dbscan");

        let p = partition(&svm, &dbscan).unwrap();
        let (only_a, only_b, both) = (key_set(&p.only_a), key_set(&p.only_b), key_set(&p.both));

        assert_eq!(only_a, BTreeSet::from([key(1)]));
        assert_eq!(only_b, BTreeSet::from([key(3)]));
        assert_eq!(both, BTreeSet::from([key(2), key(4)]));

        assert!(only_a.is_disjoint(&only_b));
        assert!(only_a.is_disjoint(&both));
        assert!(only_b.is_disjoint(&both));

        let union = only_a
            .iter()
            .chain(&only_b)
            .chain(&both)
            .cloned()
            .collect::<BTreeSet<_>>();
        let expected = key_set(&KeySet::from_subset(&svm).unwrap())
            .union(&key_set(&KeySet::from_subset(&dbscan).unwrap()))
            .cloned()
            .collect::<BTreeSet<_>>();
        assert_eq!(union, expected);
    }

    #[test]
    fn test_overlap_respects_range() {
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 3)).unwrap();
        let both = overlap(&flagged(range, "svm"), &flagged(range, "dbscan")).unwrap();
        assert_eq!(both.keys().unwrap(), vec![key(2)]);
    }

    #[test]
    fn test_partition_ignores_keys_outside_range() {
        let raw = df![
            "Ticker" => &["AAA", "AAA"],
            "Date" => &["2023-01-03", "2023-01-05"],
            "svm" => &["1", "0"],
            "dbscan" => &["1", "1"]
        ]
        .expect("Failed to create mock DF");
        let anomalies = AnomalyTable::from_frame(raw).unwrap();
        let range = DateRange::new(date(2023, 1, 1), date(2023, 1, 3)).unwrap();
        let ticker = Ticker::new("AAA").unwrap();
        let svm = anomalies
            .filter_flagged(range, &ticker, &ModelLabel::new("svm").unwrap())
            .unwrap();
        let dbscan = anomalies
            .filter_flagged(range, &ticker, &ModelLabel::new("dbscan").unwrap())
            .unwrap();

        let p = partition(&svm, &dbscan).unwrap();
        assert_eq!(p.both.keys().unwrap(), vec![key(3)]);
        assert!(p.only_a.is_empty());
        assert!(p.only_b.is_empty());
    }

    #[test]
    fn test_overlap_of_empty_subset_is_empty() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let empty = flagged(range, "svm");
        let p = partition(&empty, &flagged(full_range(), "dbscan")).unwrap();
        assert!(p.only_a.is_empty());
        assert!(p.both.is_empty());
        assert_eq!(p.only_b.len(), 3);
    }

    #[test]
    fn test_priced_uses_first_price_row_and_drops_unpriced_keys() {
        let raw = df![
            "Ticker" => &["AAA", "AAA", "AAA"],
            "Date" => &["2023-01-02", "2023-01-02", "2023-01-04"],
            "Adj Close" => &["20.0", "21.0", "40.0"]
        ]
        .expect("Failed to create mock DF");
        let prices = PriceTable::from_frame(raw)
            .unwrap()
            .filter(full_range(), &Ticker::new("AAA").unwrap())
            .unwrap();

        let svm = KeySet::from_subset(&flagged(full_range(), "svm")).unwrap();
        let points = svm.priced(&prices).unwrap();

        let values = points
            .iter()
            .map(|p| (p.date, p.adj_close))
            .collect::<Vec<_>>();
        assert_eq!(values, vec![(date(2023, 1, 2), 20.0), (date(2023, 1, 4), 40.0)]);
    }
}
