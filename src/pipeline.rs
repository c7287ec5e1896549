//! Alignment pipeline
//!
//! raw log ─▶ parsed records ─▶ aligned CSV ─▶ merged CSV (seq + par) ─▶ PNG
//!
//! One generic aligner handles every dataset; the dataset only contributes
//! its file-name template ([`DatasetLayout`]). Missing or empty logs abort
//! the run, unmatched lines inside a log do not.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Category, DatasetLayout, ReportConfig};
use crate::pairing::pair_records;
use crate::parser::{
    parse_cpu_log, parse_execution_time_log, parse_preprocessing_line, parse_ram_log,
    parse_termination_line, PreprocessingEvent,
};
use crate::plot::{render_csv, render_table, ChartSpec, ChartStyle, Series};
use crate::report::{DatasetSummary, RunSummary};
use crate::sequencer::sequence_values;
use crate::table::{Table, REPETITION_COLUMN};
use crate::{Error, Result};

/// File name of the optional Merkle preprocessing log inside a category folder.
pub const PREPROCESSING_LOG: &str = "preprocessing.log";

/// Bits per GiB, for converting `dbLen`.
const BITS_PER_GIB: f64 = 8.0 * 1024.0 * 1024.0 * 1024.0;

/// A measured quantity that exists in both runs and can be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// RAM usage at the end of each repetition
    Ram,
    /// Peak `us` CPU usage per Start/End sample
    Cpu,
    /// Wall-clock time of each repetition
    ExecutionTime,
}

impl Metric {
    /// All metrics in output order.
    pub const ALL: [Self; 3] = [Self::Ram, Self::Cpu, Self::ExecutionTime];

    /// Short name used in file names.
    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Ram => "ram",
            Self::Cpu => "cpu",
            Self::ExecutionTime => "time",
        }
    }

    /// Value column of the aligned single-run table that gets compared.
    #[must_use]
    pub const fn value_column(self) -> &'static str {
        match self {
            Self::Ram => "RAM_Usage_End_MB",
            Self::Cpu => "Max_CPU_Usage_us",
            Self::ExecutionTime => "Execution_Time_ms",
        }
    }

    /// Header of the sequential series in the merged table.
    #[must_use]
    pub const fn sequential_column(self) -> &'static str {
        match self {
            Self::Ram => "RAM_Usage_Sequential_MB",
            Self::Cpu => "Max_CPU_Usage_Sequential_us",
            Self::ExecutionTime => "Execution_Time_Sequential_ms",
        }
    }

    /// Header of the parallel series in the merged table.
    #[must_use]
    pub const fn parallel_column(self) -> &'static str {
        match self {
            Self::Ram => "RAM_Usage_Parallel_MB",
            Self::Cpu => "Max_CPU_Usage_Parallel_us",
            Self::ExecutionTime => "Execution_Time_Parallel_ms",
        }
    }

    const fn y_desc(self) -> &'static str {
        match self {
            Self::Ram => "RAM Usage (MB)",
            Self::Cpu => "CPU Usage (% us)",
            Self::ExecutionTime => "Execution Time (ms)",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Ram => "RAM Usage",
            Self::Cpu => "Max CPU Usage",
            Self::ExecutionTime => "Execution Time",
        }
    }
}

/// The three aligned tables of one dataset in one run.
#[derive(Debug, Clone)]
pub struct AlignedDataset {
    /// `Repetition, RAM_Usage_Start_MB, RAM_Usage_End_MB`
    pub ram: Table,
    /// `Repetition, Max_CPU_Usage_us` (Start and End rows per repetition)
    pub cpu: Table,
    /// `Repetition, Execution_Time_ms`
    pub time: Table,
    /// Counters collected while aligning
    pub summary: DatasetSummary,
}

impl AlignedDataset {
    /// Aligned table holding `metric`.
    #[must_use]
    pub const fn table(&self, metric: Metric) -> &Table {
        match metric {
            Metric::Ram => &self.ram,
            Metric::Cpu => &self.cpu,
            Metric::ExecutionTime => &self.time,
        }
    }
}

fn read_log(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("{}: {e}", path.display()))))?;
    if text.trim().is_empty() {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }
    Ok(text)
}

/// Align the RAM, CPU and execution-time logs of one dataset.
///
/// `source` names the run (category folder) for the summary.
///
/// # Errors
///
/// Returns an IO error if a log is missing, [`Error::EmptyInput`] if a log
/// yields no usable records and [`Error::Format`] for a malformed execution
/// time.
pub fn align_dataset(
    layout: &DatasetLayout,
    input_dir: &Path,
    source: &str,
) -> Result<AlignedDataset> {
    let mut summary = DatasetSummary::new(&layout.name, source);

    // RAM: Start/End pairing by repetition id
    let ram_path = layout.ram_log(input_dir);
    let outcome = pair_records(&parse_ram_log(&read_log(&ram_path)?));
    if outcome.pairs.is_empty() {
        return Err(Error::EmptyInput(ram_path));
    }
    if outcome.dropped_ends > 0 || outcome.unmatched_starts > 0 {
        tracing::debug!(
            dataset = %layout.name,
            dropped_ends = outcome.dropped_ends,
            unmatched_starts = outcome.unmatched_starts,
            "RAM records without partner"
        );
    }
    summary.ram_pairs = outcome.pairs.len();
    summary.ram_dropped_ends = outcome.dropped_ends;
    summary.ram_unmatched_starts = outcome.unmatched_starts;

    let ram_reps: Vec<u32> = outcome.pairs.iter().map(|p| p.repetition).collect();
    let ram = Table::with_repetitions(
        &ram_reps,
        vec![
            ("RAM_Usage_Start_MB", outcome.pairs.iter().map(|p| p.start.value).collect()),
            ("RAM_Usage_End_MB", outcome.pairs.iter().map(|p| p.end.value).collect()),
        ],
    )?;

    // CPU: block maxima, then nearest-following pairing by id
    let cpu_path = layout.cpu_log(input_dir);
    let blocks = parse_cpu_log(&read_log(&cpu_path)?);
    let sequenced = sequence_values(&blocks);
    if sequenced.is_empty() {
        return Err(Error::EmptyInput(cpu_path));
    }
    summary.cpu_blocks = blocks.len();
    summary.cpu_rows = sequenced.len();

    let (cpu_reps, cpu_values): (Vec<u32>, Vec<f64>) = sequenced.into_iter().unzip();
    let cpu = Table::with_repetitions(&cpu_reps, vec![(Metric::Cpu.value_column(), cpu_values)])?;

    // Execution time: one entry per repetition, in file order
    let time_path = layout.time_log(input_dir);
    let times = parse_execution_time_log(&read_log(&time_path)?)?;
    if times.is_empty() {
        return Err(Error::EmptyInput(time_path));
    }
    summary.execution_times = times.len();

    let time_reps: Vec<u32> = (1..).take(times.len()).collect();
    let time = Table::with_repetitions(
        &time_reps,
        vec![(Metric::ExecutionTime.value_column(), times)],
    )?;

    summary.record_table(&ram);
    summary.record_table(&cpu);
    summary.record_table(&time);

    tracing::info!(
        dataset = %layout.name,
        source,
        ram_pairs = summary.ram_pairs,
        cpu_rows = summary.cpu_rows,
        execution_times = summary.execution_times,
        "aligned dataset"
    );

    Ok(AlignedDataset { ram, cpu, time, summary })
}

/// Write the aligned tables of `dataset` into `out_dir`.
///
/// # Errors
///
/// Returns an IO or Arrow error if a CSV cannot be written.
pub fn write_aligned(name: &str, dataset: &AlignedDataset, out_dir: &Path) -> Result<Vec<PathBuf>> {
    Metric::ALL
        .into_iter()
        .map(|metric| {
            let path = out_dir.join(format!("{name}_{}.csv", metric.stem()));
            dataset.table(metric).write_csv(&path)?;
            Ok(path)
        })
        .collect()
}

/// Merge one metric of a sequential and a parallel run side by side.
///
/// The result has columns `Repetition`, `<metric>_Sequential_<unit>`,
/// `<metric>_Parallel_<unit>`; rows are matched by position.
///
/// # Errors
///
/// Returns [`Error::RowCountMismatch`] if the runs differ in length.
pub fn merge_metric(
    sequential: &AlignedDataset,
    parallel: &AlignedDataset,
    metric: Metric,
) -> Result<Table> {
    let value = metric.value_column();
    sequential
        .table(metric)
        .select(&[REPETITION_COLUMN, value])?
        .rename_column(value, metric.sequential_column())?
        .merge_column(parallel.table(metric), value, metric.parallel_column())
}

/// Convert a Merkle preprocessing log into `DB_Size_GiB, Processing_Time_s`.
///
/// Each evaluation lasts until the next event of the log, either the next
/// evaluation or a `simulation terminated successfully` line. Logs with
/// several appended runs therefore never count the idle gap between runs.
/// An evaluation still open at the end of the log is dropped.
///
/// # Errors
///
/// Returns an IO error if the log cannot be read and
/// [`Error::EmptyInput`] if it has no complete evaluation.
#[allow(clippy::cast_precision_loss)]
pub fn preprocessing_timeline(path: &Path) -> Result<Table> {
    let text = read_log(path)?;

    let mut sizes = Vec::new();
    let mut durations = Vec::new();
    let mut open: Option<PreprocessingEvent> = None;

    for line in text.lines() {
        let (at, next) = if let Some(event) = parse_preprocessing_line(line) {
            (event.timestamp, Some(event))
        } else if let Some(terminated) = parse_termination_line(line) {
            (terminated, None)
        } else {
            continue;
        };

        if let Some(event) = open.take() {
            let seconds = (at - event.timestamp).num_seconds();
            if seconds < 0 {
                tracing::warn!(
                    db_len_bits = event.db_len_bits,
                    seconds,
                    "negative processing time"
                );
            }
            sizes.push(event.db_len_bits as f64 / BITS_PER_GIB);
            durations.push(seconds as f64);
        }
        open = next;
    }

    if let Some(event) = open {
        tracing::warn!(db_len_bits = event.db_len_bits, "last evaluation never finished, dropped");
    }
    if sizes.is_empty() {
        return Err(Error::EmptyInput(path.to_path_buf()));
    }

    Table::from_f64_columns(vec![("DB_Size_GiB", sizes), ("Processing_Time_s", durations)])
}

/// Merge and plot every metric of one dataset, sequential vs. parallel.
///
/// Writes `<name>_<metric>_merged.csv` into `out_dir` and
/// `<name>_<metric>_comparison.png` into `plot_dir`, returning the paths in
/// that order per metric.
///
/// # Errors
///
/// Returns [`Error::RowCountMismatch`] if the runs differ in length; nothing
/// is written for that metric or the ones after it.
pub fn compare_dataset(
    name: &str,
    sequential: &AlignedDataset,
    parallel: &AlignedDataset,
    out_dir: &Path,
    plot_dir: &Path,
    style: ChartStyle,
) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(Metric::ALL.len() * 2);
    for metric in Metric::ALL {
        let merged = merge_metric(sequential, parallel, metric)?;
        let csv = out_dir.join(format!("{name}_{}_merged.csv", metric.stem()));
        merged.write_csv(&csv)?;

        let chart = plot_dir.join(format!("{name}_{}_comparison.png", metric.stem()));
        let spec = ChartSpec::comparison(
            format!("{}: {name}, sequential vs. parallel", metric.title()),
            metric.y_desc(),
            metric.sequential_column(),
            metric.parallel_column(),
        );
        render_csv(&csv, &spec, style, &chart)?;

        outputs.push(csv);
        outputs.push(chart);
    }
    Ok(outputs)
}

/// Plot RAM at the start and end of every repetition of one run.
///
/// # Errors
///
/// Returns [`Error::Plot`] if the chart cannot be drawn.
pub fn render_ram_usage(
    name: &str,
    dataset: &AlignedDataset,
    plot_dir: &Path,
    style: ChartStyle,
) -> Result<PathBuf> {
    let chart = plot_dir.join(format!("{name}_ram.png"));
    let spec = ChartSpec {
        title: format!("RAM Usage During Repetitions: {name}"),
        x_column: REPETITION_COLUMN.to_string(),
        x_desc: "Repetition Number".to_string(),
        y_desc: Metric::Ram.y_desc().to_string(),
        series: vec![
            Series::new("RAM_Usage_Start_MB", "RAM Start (MB)"),
            Series::new("RAM_Usage_End_MB", "RAM End (MB)"),
        ],
    };
    render_table(&dataset.ram, &spec, style, &chart)?;

    if let Some(peak) = dataset.summary.columns.get("RAM_Usage_End_MB") {
        tracing::info!(dataset = name, peak_ram_mb = peak.max, "peak RAM usage");
    }
    Ok(chart)
}

fn align_category(
    config: &ReportConfig,
    category: Category,
    summary: &mut RunSummary,
) -> Result<Vec<(String, AlignedDataset)>> {
    let layout = config.layout(category)?;
    let input_dir = config.input_dir(category)?;
    let out_dir = config.output_dir(category)?;
    let plot_dir = config.plot_dir(category)?;

    let mut aligned = Vec::with_capacity(layout.datasets.len());
    for dataset in &layout.datasets {
        let data = align_dataset(dataset, &input_dir, &layout.folder)?;
        for path in write_aligned(&dataset.name, &data, &out_dir)? {
            summary.record_output(path);
        }
        summary.record_output(render_ram_usage(&dataset.name, &data, &plot_dir, config.style)?);
        summary.add_dataset(data.summary.clone());
        aligned.push((dataset.name.clone(), data));
    }

    let timeline_log = input_dir.join(PREPROCESSING_LOG);
    if timeline_log.exists() {
        let table = preprocessing_timeline(&timeline_log)?;
        let csv = out_dir.join("preprocessing_timeline.csv");
        table.write_csv(&csv)?;
        summary.record_output(&csv);

        let chart = plot_dir.join("preprocessing_timeline.png");
        let spec = ChartSpec {
            title: "Processing Time vs Database Size".to_string(),
            x_column: "DB_Size_GiB".to_string(),
            x_desc: "Database Size (GiB)".to_string(),
            y_desc: "Processing Time (seconds)".to_string(),
            series: vec![Series::new("Processing_Time_s", "Processing Time")],
        };
        render_csv(&csv, &spec, ChartStyle::Line, &chart)?;
        summary.record_output(chart);
    }

    Ok(aligned)
}

/// Process one category end to end and write `summary.json`.
///
/// Sequential categories are aligned. Parallel categories are aligned
/// together with their sequential counterpart, then every metric of every
/// dataset is merged and plotted.
///
/// # Errors
///
/// Any fatal error of the steps above; nothing is retried.
pub fn run(config: &ReportConfig, category: Category) -> Result<RunSummary> {
    let mut summary = RunSummary::new(category);
    let aligned = align_category(config, category, &mut summary)?;

    if let Some(seq_category) = category.sequential_counterpart() {
        let sequential = align_category(config, seq_category, &mut summary)?;
        let out_dir = config.output_dir(category)?.join("comparison");
        let plot_dir = config.plot_dir(category)?;

        for (name, parallel) in &aligned {
            let Some((_, seq)) = sequential.iter().find(|(seq_name, _)| seq_name == name) else {
                return Err(Error::Config(format!(
                    "dataset {name} of {category} has no counterpart in {seq_category}"
                )));
            };
            for path in compare_dataset(name, seq, parallel, &out_dir, &plot_dir, config.style)? {
                summary.record_output(path);
            }
        }
    }

    let summary_path = config.output_dir(category)?.join("summary.json");
    summary.record_output(&summary_path);
    summary.write_json(&summary_path)?;

    Ok(summary)
}
