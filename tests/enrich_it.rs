mod common;

use std::fs;

use stockscope::prelude::*;

use crate::common::{fixture, model};

fn fixture_enrich(output: impl Into<std::path::PathBuf>) -> EnrichConfig {
    EnrichConfig::default()
        .with_reference(fixture("overall_anomalies.csv"))
        .with_candidates(Default::default())
        .add_candidate(model("svm"), fixture("svm_anomalies.csv"))
        .add_candidate(model("dbscan"), fixture("anomalies_dbscan_pca.csv"))
        .with_output(output)
}

fn int_column(table: &impl Table, name: &str) -> Vec<i64> {
    let column = table.as_df().column(name).expect("column exists");
    column
        .cast(&polars::prelude::DataType::Int64)
        .expect("numeric column")
        .i64()
        .expect("Int64 column")
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn enrich_files_writes_match_columns() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("data").join("full_table.csv");

    let enriched = enrich_files(&fixture_enrich(&output)).expect("Failed to enrich");

    // reference rows in date order: AAA 01-01, BBB 01-02, AAA 01-03, AAA 01-04, CCC 01-05
    assert_eq!(enriched.len(), 5);
    assert_eq!(int_column(&enriched, "dbscan_match"), vec![1, 0, 1, 0, 0]);
    assert_eq!(int_column(&enriched, "svm_match"), vec![0, 0, 1, 0, 1]);

    let written = fs::read_to_string(&output).expect("output exists");
    assert_eq!(
        written.lines().next(),
        Some("Ticker,Date,Overall_Anomaly,dbscan_match,svm_match")
    );
    assert_eq!(written.lines().count(), 6);
}

#[test]
fn enriched_output_reloads_as_anomaly_table() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("full_table.csv");
    let enriched = enrich_files(&fixture_enrich(&output)).unwrap();

    let reloaded = AnomalyTable::load(&output).unwrap();
    assert_eq!(reloaded.len(), enriched.len());
    assert_eq!(int_column(&reloaded, "svm_match"), vec![0, 0, 1, 0, 1]);
    assert_eq!(reloaded.models(), vec![model("Overall_Anomaly")]);
}

#[test]
fn reference_row_count_survives_duplicate_candidate_keys() {
    let reference = AnomalyTable::load(fixture("overall_anomalies.csv")).unwrap();
    let svm = AnomalyTable::load(fixture("svm_anomalies.csv")).unwrap();
    assert_eq!(svm.len(), 4);

    let candidates = [(model("svm"), svm)].into_iter().collect();
    let enriched = enrich(&reference, &candidates).unwrap();

    assert_eq!(enriched.len(), reference.len());
    assert_eq!(enriched.labels(), &[model("svm")]);
}

#[test]
fn missing_candidate_file_fails_before_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("full_table.csv");
    let cfg = fixture_enrich(&output).add_candidate(model("lof"), fixture("lof_anomalies.csv"));

    let err = enrich_files(&cfg).expect_err("lof file does not exist");
    assert!(err.is_source_not_found());
    assert!(!output.exists());
}
