#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use stockscope::prelude::*;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("input")
        .join(name)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn ticker(symbol: &str) -> Ticker {
    Ticker::new(symbol).expect("valid ticker")
}

pub fn model(label: &str) -> ModelLabel {
    ModelLabel::new(label).expect("valid model label")
}

pub fn fixture_config() -> DashboardConfig {
    DashboardConfig::default()
        .with_price_table(fixture("prices.csv"))
        .with_anomaly_table(fixture("full_table.csv"))
}

pub fn setup_session() -> Session {
    Session::open(&fixture_config()).expect("Failed to open fixture session")
}

pub fn dates(points: &[PricePoint]) -> Vec<NaiveDate> {
    points.iter().map(|p| p.date).collect()
}
