//! Report configuration
//!
//! Maps each [`Category`] to an input folder and the datasets found inside
//! it. The built-in defaults mirror the file names the VPIR simulation
//! harness writes; a TOML file can override any of it:
//!
//! ```toml
//! input_root = "logs"
//! output_root = "out"
//! style = "line"
//!
//! [[categories]]
//! category = "singlePerformance"
//! folder = "singlePerformance"
//! datasets = [
//!     { name = "lwe", log_prefix = "lwe" },
//! ]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::plot::ChartStyle;
use crate::{Error, Result};

/// A named input folder of benchmark logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Single-retrieval runs without worker pool
    #[value(name = "singlePerformance")]
    SinglePerformance,
    /// Merkle preprocessing runs without worker pool
    #[value(name = "preprocessingPerformance")]
    PreprocessingPerformance,
    /// Single-retrieval runs with worker pool
    #[value(name = "singlePerformanceParallel")]
    SinglePerformanceParallel,
    /// Merkle preprocessing runs with worker pool
    #[value(name = "preprocessingPerformanceParallel")]
    PreprocessingPerformanceParallel,
}

impl Category {
    /// All categories in CLI order.
    pub const ALL: [Self; 4] = [
        Self::SinglePerformance,
        Self::PreprocessingPerformance,
        Self::SinglePerformanceParallel,
        Self::PreprocessingPerformanceParallel,
    ];

    /// CLI / folder name of the category.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SinglePerformance => "singlePerformance",
            Self::PreprocessingPerformance => "preprocessingPerformance",
            Self::SinglePerformanceParallel => "singlePerformanceParallel",
            Self::PreprocessingPerformanceParallel => "preprocessingPerformanceParallel",
        }
    }

    /// The sequential category a parallel one is compared against.
    #[must_use]
    pub const fn sequential_counterpart(self) -> Option<Self> {
        match self {
            Self::SinglePerformanceParallel => Some(Self::SinglePerformance),
            Self::PreprocessingPerformanceParallel => Some(Self::PreprocessingPerformance),
            Self::SinglePerformance | Self::PreprocessingPerformance => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File-name template of one primitive's logs inside a category folder.
///
/// Logs are `<log_prefix>_ram_usage.txt`, `<log_prefix>_cpu_usage.txt` and
/// `<time_prefix>_execution_time.txt` (`time_prefix` defaults to
/// `log_prefix`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    /// Dataset name used in output file names
    pub name: String,
    /// Prefix of the RAM and CPU logs
    pub log_prefix: String,
    /// Prefix of the execution-time log, if different
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_prefix: Option<String>,
}

impl DatasetLayout {
    /// Dataset whose logs all share `name` as prefix.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            log_prefix: name.clone(),
            name,
            time_prefix: None,
        }
    }

    /// Override the execution-time log prefix.
    #[must_use]
    pub fn with_time_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.time_prefix = Some(prefix.into());
        self
    }

    /// Path of the RAM usage log in `dir`.
    #[must_use]
    pub fn ram_log(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_ram_usage.txt", self.log_prefix))
    }

    /// Path of the CPU usage log in `dir`.
    #[must_use]
    pub fn cpu_log(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_cpu_usage.txt", self.log_prefix))
    }

    /// Path of the execution-time log in `dir`.
    #[must_use]
    pub fn time_log(&self, dir: &Path) -> PathBuf {
        let prefix = self.time_prefix.as_deref().unwrap_or(&self.log_prefix);
        dir.join(format!("{prefix}_execution_time.txt"))
    }
}

/// Folder and datasets of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLayout {
    /// The category this entry configures
    pub category: Category,
    /// Folder name below the input and output roots
    pub folder: String,
    /// Datasets expected in the folder
    pub datasets: Vec<DatasetLayout>,
}

impl CategoryLayout {
    /// Built-in layout of a category.
    #[must_use]
    pub fn default_for(category: Category) -> Self {
        let datasets = match category {
            Category::SinglePerformance | Category::SinglePerformanceParallel => vec![
                DatasetLayout::new("elliptic"),
                DatasetLayout::new("lwe"),
                DatasetLayout::new("lwe128"),
            ],
            Category::PreprocessingPerformance | Category::PreprocessingPerformanceParallel => {
                vec![DatasetLayout::new("merkle").with_time_prefix("generateMerkleProofsParallel")]
            }
        };

        Self {
            category,
            folder: category.name().to_string(),
            datasets,
        }
    }
}

/// Configuration passed into [`crate::pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory containing one folder per category
    pub input_root: PathBuf,
    /// Directory receiving aligned CSVs, merged CSVs, plots and the summary
    pub output_root: PathBuf,
    /// Chart style for comparison plots
    pub style: ChartStyle,
    /// Category layouts
    pub categories: Vec<CategoryLayout>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("."),
            output_root: PathBuf::from("results"),
            style: ChartStyle::default(),
            categories: Category::ALL.into_iter().map(CategoryLayout::default_for).collect(),
        }
    }
}

impl ReportConfig {
    /// Create a new config builder seeded with the built-in defaults.
    #[must_use]
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Parse a TOML config. Omitted keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML is invalid or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, [`Error::Config`] if
    /// it is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Layout configured for `category`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the category is not configured.
    pub fn layout(&self, category: Category) -> Result<&CategoryLayout> {
        self.categories
            .iter()
            .find(|layout| layout.category == category)
            .ok_or_else(|| Error::Config(format!("category {category} is not configured")))
    }

    /// Input folder of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the category is not configured.
    pub fn input_dir(&self, category: Category) -> Result<PathBuf> {
        Ok(self.input_root.join(&self.layout(category)?.folder))
    }

    /// Output folder of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the category is not configured.
    pub fn output_dir(&self, category: Category) -> Result<PathBuf> {
        Ok(self.output_root.join(&self.layout(category)?.folder))
    }

    /// Chart folder of `category`: `<output_root>/plots/<folder>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the category is not configured.
    pub fn plot_dir(&self, category: Category) -> Result<PathBuf> {
        Ok(self.output_root.join("plots").join(&self.layout(category)?.folder))
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for layout in &self.categories {
            if !seen.insert(layout.category) {
                return Err(Error::Config(format!(
                    "category {} configured twice",
                    layout.category
                )));
            }
            if layout.folder.trim().is_empty() {
                return Err(Error::Config(format!("category {} has no folder", layout.category)));
            }
            if layout.datasets.is_empty() {
                return Err(Error::Config(format!("category {} has no datasets", layout.category)));
            }

            let mut names = HashSet::new();
            for dataset in &layout.datasets {
                if dataset.name.trim().is_empty() || dataset.log_prefix.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "category {} has a dataset without name or prefix",
                        layout.category
                    )));
                }
                if !names.insert(dataset.name.as_str()) {
                    return Err(Error::Config(format!(
                        "dataset {} listed twice in {}",
                        dataset.name, layout.category
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug, Default)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    /// Set the input root directory.
    #[must_use]
    pub fn input_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_root = path.into();
        self
    }

    /// Set the output root directory.
    #[must_use]
    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_root = path.into();
        self
    }

    /// Set the chart style.
    #[must_use]
    pub const fn style(mut self, style: ChartStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Replace the layout of one category.
    #[must_use]
    pub fn category(mut self, layout: CategoryLayout) -> Self {
        self.config.categories.retain(|c| c.category != layout.category);
        self.config.categories.push(layout);
        self
    }

    /// Build and validate the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a category has no datasets or lists a
    /// dataset twice.
    pub fn build(self) -> Result<ReportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layouts() {
        let config = ReportConfig::default();
        assert_eq!(config.categories.len(), 4);

        let single = config.layout(Category::SinglePerformance).unwrap();
        let names: Vec<&str> = single.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["elliptic", "lwe", "lwe128"]);

        let merkle = &config.layout(Category::PreprocessingPerformance).unwrap().datasets[0];
        let dir = Path::new("in");
        assert_eq!(merkle.ram_log(dir), dir.join("merkle_ram_usage.txt"));
        assert_eq!(
            merkle.time_log(dir),
            dir.join("generateMerkleProofsParallel_execution_time.txt")
        );
    }

    #[test]
    fn test_counterparts() {
        assert_eq!(
            Category::SinglePerformanceParallel.sequential_counterpart(),
            Some(Category::SinglePerformance)
        );
        assert_eq!(Category::SinglePerformance.sequential_counterpart(), None);
        assert_eq!(
            Category::PreprocessingPerformanceParallel.sequential_counterpart(),
            Some(Category::PreprocessingPerformance)
        );
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = ReportConfig::from_toml_str(
            r#"
            output_root = "out"
            style = "line"

            [[categories]]
            category = "singlePerformance"
            folder = "seq"
            datasets = [{ name = "lwe", log_prefix = "lwe" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.output_root, PathBuf::from("out"));
        assert_eq!(config.style, ChartStyle::Line);
        assert_eq!(config.input_root, PathBuf::from("."));
        assert_eq!(config.input_dir(Category::SinglePerformance).unwrap(), PathBuf::from("./seq"));
        assert!(config.layout(Category::PreprocessingPerformance).is_err());
    }

    #[test]
    fn test_from_toml_rejects_duplicates() {
        let err = ReportConfig::from_toml_str(
            r#"
            [[categories]]
            category = "singlePerformance"
            folder = "a"
            datasets = [{ name = "lwe", log_prefix = "lwe" }, { name = "lwe", log_prefix = "x" }]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_category() {
        let err = ReportConfig::from_toml_str(
            r#"
            [[categories]]
            category = "doublePerformance"
            folder = "a"
            datasets = [{ name = "lwe", log_prefix = "lwe" }]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_replaces_category() {
        let config = ReportConfig::builder()
            .output_root("out")
            .category(CategoryLayout {
                category: Category::SinglePerformance,
                folder: "seq".into(),
                datasets: vec![DatasetLayout::new("lwe")],
            })
            .build()
            .unwrap();
        assert_eq!(config.categories.len(), 4);
        assert_eq!(
            config.output_dir(Category::SinglePerformance).unwrap(),
            PathBuf::from("out/seq")
        );
        assert_eq!(
            config.plot_dir(Category::SinglePerformance).unwrap(),
            PathBuf::from("out/plots/seq")
        );
    }

    #[test]
    fn test_builder_rejects_empty_datasets() {
        let result = ReportConfig::builder()
            .category(CategoryLayout {
                category: Category::SinglePerformance,
                folder: "seq".into(),
                datasets: vec![],
            })
            .build();
        assert!(result.is_err());
    }
}
