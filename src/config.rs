use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{KnownModel, ModelLabel},
    error::{IoError, StockscopeResult},
};

/// Locations and options of the dashboard's data sources.
///
/// Relative paths are resolved against the working directory, or against
/// a data root set with [`DashboardConfig::with_root`].
///
/// # Example
/// ```no_run
/// use stockscope::config::DashboardConfig;
///
/// let cfg = DashboardConfig::default()
///     .with_root("/srv/dashboard")
///     .with_anomaly_table("data/full_table.csv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Daily prices: `Ticker`, `Date`, `Adj Close`, ...
    pub price_table: PathBuf,
    /// Merged anomaly flags: `Ticker`, `Date`, one 0/1 column per model.
    pub anomaly_table: PathBuf,
    /// Model labels offered for comparison, in display order.
    pub models: Vec<ModelLabel>,
    /// Settings of the offline enrichment step.
    pub enrich: EnrichConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            price_table: PathBuf::from("data/SP600_AdjClose_Volume_Return.csv"),
            anomaly_table: PathBuf::from("data/full_table.csv"),
            models: KnownModel::selectable(),
            enrich: EnrichConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Reads a JSON config file. Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> StockscopeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IoError::SourceNotFound(path.to_path_buf()).into());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| IoError::ReadFailed(format!("{}: {e}", path.display())))?;
        Ok(serde_json::from_str(&raw).map_err(IoError::Json)?)
    }

    /// Rebases every relative path onto `root`.
    pub fn with_root(self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            price_table: rebase(root, self.price_table),
            anomaly_table: rebase(root, self.anomaly_table),
            enrich: self.enrich.with_root(root),
            ..self
        }
    }

    pub fn with_price_table(self, path: impl Into<PathBuf>) -> Self {
        Self {
            price_table: path.into(),
            ..self
        }
    }

    pub fn with_anomaly_table(self, path: impl Into<PathBuf>) -> Self {
        Self {
            anomaly_table: path.into(),
            ..self
        }
    }

    pub fn with_models(self, models: Vec<ModelLabel>) -> Self {
        Self { models, ..self }
    }

    pub fn with_enrich(self, enrich: EnrichConfig) -> Self {
        Self { enrich, ..self }
    }
}

/// Inputs and output of the anomaly matcher run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub reference: PathBuf,
    /// Candidate anomaly tables by label. Each label yields a
    /// `{label}_match` column.
    pub candidates: BTreeMap<ModelLabel, PathBuf>,
    pub output: PathBuf,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        let candidates = [
            ("svm", "data/svm_anomalies.csv"),
            ("dbscan", "data/anomalies_dbscan_pca.csv"),
        ]
        .into_iter()
        .filter_map(|(label, path)| Some((ModelLabel::new(label).ok()?, PathBuf::from(path))))
        .collect();

        Self {
            reference: PathBuf::from("data/overall_anomalies.csv"),
            candidates,
            output: PathBuf::from("data/full_table.csv"),
        }
    }
}

impl EnrichConfig {
    pub fn with_root(self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            reference: rebase(root, self.reference),
            candidates: self
                .candidates
                .into_iter()
                .map(|(label, path)| (label, rebase(root, path)))
                .collect(),
            output: rebase(root, self.output),
        }
    }

    pub fn with_reference(self, path: impl Into<PathBuf>) -> Self {
        Self {
            reference: path.into(),
            ..self
        }
    }

    /// Replaces the whole candidate set.
    pub fn with_candidates(self, candidates: BTreeMap<ModelLabel, PathBuf>) -> Self {
        Self { candidates, ..self }
    }

    /// Adds a candidate, replacing any earlier one with the same label.
    pub fn add_candidate(mut self, label: ModelLabel, path: impl Into<PathBuf>) -> Self {
        self.candidates.insert(label, path.into());
        self
    }

    pub fn with_output(self, path: impl Into<PathBuf>) -> Self {
        Self {
            output: path.into(),
            ..self
        }
    }
}

fn rebase(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
