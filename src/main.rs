//! perflog command line
//!
//! ```text
//! perflog <CATEGORY> [--config FILE] [--input-root DIR] [--output-root DIR] [--style scatter|line]
//! ```
//!
//! Logging is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use perflog::plot::ChartStyle;
use perflog::{pipeline, Category, ReportConfig};
use tracing_subscriber::EnvFilter;

/// Align, merge and plot VPIR benchmark logs.
#[derive(Parser, Debug)]
#[command(name = "perflog", version, about, long_about = None)]
struct Args {
    /// Category folder to process
    #[arg(value_enum)]
    category: Category,

    /// TOML file overriding the built-in folder layout
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing the category folders
    #[arg(long)]
    input_root: Option<PathBuf>,

    /// Directory receiving CSVs, charts and summary.json
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Chart style for comparison plots
    #[arg(long, value_enum)]
    style: Option<ChartStyle>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => ReportConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ReportConfig::default(),
    };
    if let Some(root) = args.input_root {
        config.input_root = root;
    }
    if let Some(root) = args.output_root {
        config.output_root = root;
    }
    if let Some(style) = args.style {
        config.style = style;
    }

    tracing::info!(
        category = %args.category,
        input_root = %config.input_root.display(),
        "processing"
    );
    let summary = pipeline::run(&config, args.category)
        .with_context(|| format!("failed to process {}", args.category))?;

    tracing::info!(
        category = %summary.category(),
        generated_at = %summary.generated_at(),
        datasets = summary.datasets().len(),
        outputs = summary.outputs().len(),
        "done"
    );
    Ok(())
}
