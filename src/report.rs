//! Run summary (`summary.json`)
//!
//! Records what one invocation produced: per dataset and run, how many
//! records were paired or dropped, basic statistics of every aligned value
//! column, and the paths of all written artifacts.
//!
//! ```text
//! RunSummary (1) ──< DatasetSummary (N) ──< ColumnStats (per column)
//!       └──< outputs (CSV / PNG paths)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Category;
use crate::table::{Table, REPETITION_COLUMN};
use crate::Result;

/// Min / mean / max of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Number of values
    pub count: usize,
    /// Smallest value
    pub min: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Largest value
    pub max: f64,
}

impl ColumnStats {
    /// Compute statistics, `None` for an empty slice.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self {
            count: values.len(),
            min,
            mean,
            max,
        })
    }
}

/// Alignment counters and statistics for one dataset of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Dataset name (e.g. `lwe128`)
    pub dataset: String,
    /// Category folder the logs came from
    pub source: String,
    /// Matched Start/End RAM pairs
    pub ram_pairs: usize,
    /// RAM End records with no pending Start
    pub ram_dropped_ends: usize,
    /// RAM Start records never closed
    pub ram_unmatched_starts: usize,
    /// CPU marker blocks parsed
    pub cpu_blocks: usize,
    /// CPU rows kept after sequencing
    pub cpu_rows: usize,
    /// Execution-time entries parsed
    pub execution_times: usize,
    /// Statistics per value column, keyed by header
    pub columns: BTreeMap<String, ColumnStats>,
}

impl DatasetSummary {
    /// Empty summary for `dataset` read from `source`.
    #[must_use]
    pub fn new(dataset: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Add statistics for every non-key numeric column of `table`.
    pub fn record_table(&mut self, table: &Table) {
        for name in table.column_names() {
            if name == REPETITION_COLUMN {
                continue;
            }
            let values = table.f64_column(&name).ok();
            if let Some(stats) = values.as_deref().and_then(ColumnStats::from_values) {
                self.columns.insert(name, stats);
            }
        }
    }
}

/// Summary of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    category: Category,
    generated_at: DateTime<Utc>,
    datasets: Vec<DatasetSummary>,
    outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Create an empty summary stamped with the current time.
    #[must_use]
    pub fn new(category: Category) -> Self {
        Self {
            category,
            generated_at: Utc::now(),
            datasets: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Category that was processed.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// When the summary was created.
    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Dataset summaries in processing order.
    #[must_use]
    pub fn datasets(&self) -> &[DatasetSummary] {
        &self.datasets
    }

    /// Every file written, in order.
    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Look up a dataset summary by dataset name and source folder.
    #[must_use]
    pub fn dataset(&self, dataset: &str, source: &str) -> Option<&DatasetSummary> {
        self.datasets
            .iter()
            .find(|d| d.dataset == dataset && d.source == source)
    }

    /// Append a dataset summary.
    pub fn add_dataset(&mut self, summary: DatasetSummary) {
        self.datasets.push(summary);
    }

    /// Record a written artifact.
    pub fn record_output(&mut self, path: impl Into<PathBuf>) {
        self.outputs.push(path.into());
    }

    /// Write the summary as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an IO or JSON error if the file cannot be written.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "wrote run summary");
        Ok(())
    }
}
