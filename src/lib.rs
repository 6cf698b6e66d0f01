//! Data core of a stock anomaly dashboard.
//!
//! Loads a daily price table and a merged anomaly-flag table, enriches
//! reference anomalies with per-model membership columns, and answers
//! ticker/date-range queries that compare the anomalies of two models.

pub mod anomaly;
pub mod config;
pub mod data;
pub mod error;
pub mod prelude;
pub mod report;
pub mod session;
