use std::collections::BTreeMap;

use polars::{
    frame::{DataFrame, UniqueKeepStrategy},
    prelude::{IntoLazy, JoinArgs, JoinType, SortMultipleOptions, col, lit},
};
use tracing::{debug, info};

use crate::{
    config::EnrichConfig,
    data::{
        domain::ModelLabel,
        loader::LoadReport,
        polars_ext::polars_to_stockscope_error,
        schema::{TableCol, match_column},
        table::{AnomalyTable, Table},
    },
    error::{StockscopeResult, SystemError},
    report::io::ToCsv,
};

const ROW_INDEX: &str = "__row_idx";

/// A reference anomaly table annotated with one `{label}_match` column per
/// candidate table.
///
/// Always has exactly as many rows as the reference, in the reference's
/// order.
#[derive(Debug, Clone)]
pub struct EnrichedTable {
    df: DataFrame,
    report: LoadReport,
    labels: Vec<ModelLabel>,
}

impl Table for EnrichedTable {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn load_report(&self) -> LoadReport {
        self.report
    }
}

impl EnrichedTable {
    /// Candidate labels in the order their match columns were appended.
    pub fn labels(&self) -> &[ModelLabel] {
        &self.labels
    }

    /// Names of the appended membership columns.
    pub fn match_columns(&self) -> Vec<String> {
        self.labels.iter().map(|l| match_column(l.as_str())).collect()
    }

    pub fn into_anomaly_table(self) -> StockscopeResult<AnomalyTable> {
        AnomalyTable::new(self.df, self.report)
    }
}

/// Marks, for each reference row, whether its (Ticker, Date) key occurs in
/// each candidate table.
///
/// This is a membership test, not a join: candidate keys are deduplicated
/// before matching, so repeated keys in a candidate never multiply
/// reference rows. A `{label}_match` column already present in the
/// reference is replaced.
#[tracing::instrument(skip_all, fields(rows = reference.len(), candidates = candidates.len()))]
pub fn enrich(
    reference: &AnomalyTable,
    candidates: &BTreeMap<ModelLabel, AnomalyTable>,
) -> StockscopeResult<EnrichedTable> {
    let mut df = reference.as_df().clone();
    for label in candidates.keys() {
        let name = match_column(label.as_str());
        if df.schema().contains(&name) {
            debug!(column = %name, "Replacing existing match column");
            df = df
                .drop(&name)
                .map_err(|e| polars_to_stockscope_error("Failed to drop match column", e))?;
        }
    }

    let key = || TableCol::key().map(col);

    let mut lf = df
        .with_row_index(ROW_INDEX.into(), None)
        .map_err(|e| polars_to_stockscope_error("Failed to add row index", e))?
        .lazy();

    for (label, candidate) in candidates {
        let name = match_column(label.as_str());
        debug!(
            label = %label,
            candidate_rows = candidate.len(),
            "Matching candidate"
        );

        let keys = candidate
            .as_df()
            .clone()
            .lazy()
            .select(key())
            .unique(None, UniqueKeepStrategy::Any) // prevent row multiplication
            .with_column(lit(1i32).alias(name.as_str()));

        lf = lf
            .join(
                keys,
                key(),
                key(),
                JoinArgs {
                    how: JoinType::Left,
                    ..Default::default()
                },
            )
            .with_column(col(name.as_str()).fill_null(lit(0i32)));
    }

    let enriched = lf
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .collect()
        .and_then(|out| out.drop(ROW_INDEX))
        .map_err(|e| polars_to_stockscope_error("Failed to match anomaly tables", e))?;

    if enriched.height() != reference.len() {
        return Err(SystemError::InvariantViolation(format!(
            "enriched table has {} rows, reference has {}",
            enriched.height(),
            reference.len()
        ))
        .into());
    }

    info!(rows = enriched.height(), "Anomaly table enriched");

    Ok(EnrichedTable {
        df: enriched,
        report: reference.load_report(),
        labels: candidates.keys().cloned().collect(),
    })
}

/// Batch entry point: loads the reference and candidate files named in
/// `cfg`, enriches the reference and writes the result to `cfg.output`.
#[tracing::instrument(skip_all, fields(output = %cfg.output.display()))]
pub fn enrich_files(cfg: &EnrichConfig) -> StockscopeResult<EnrichedTable> {
    let reference = AnomalyTable::load(&cfg.reference)?;
    let candidates = cfg
        .candidates
        .iter()
        .map(|(label, path)| Ok((label.clone(), AnomalyTable::load(path)?)))
        .collect::<StockscopeResult<BTreeMap<_, _>>>()?;

    let enriched = enrich(&reference, &candidates)?;
    enriched.to_csv(&cfg.output)?;
    info!(output = %cfg.output.display(), "Enriched table written");

    Ok(enriched)
}
