//! Chart rendering (PNG via the plotters bitmap backend)
//!
//! A chart is described by a [`ChartSpec`]: one x column and any number of
//! y series, all looked up by header name. Any missing or non-numeric
//! column is fatal.

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::table::Table;
use crate::{Error, Result};

/// Output image size in pixels.
pub const CHART_SIZE: (u32, u32) = (1000, 600);

/// How series are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    /// One marker per row
    #[default]
    Scatter,
    /// Markers joined by lines
    Line,
}

/// One y series of a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    /// Column header holding the values
    pub column: String,
    /// Legend label
    pub label: String,
}

impl Series {
    /// Create a series.
    #[must_use]
    pub fn new(column: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            label: label.into(),
        }
    }
}

/// What to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    /// Caption
    pub title: String,
    /// Column header of the x values
    pub x_column: String,
    /// X axis description
    pub x_desc: String,
    /// Y axis description
    pub y_desc: String,
    /// Y series, drawn in order
    pub series: Vec<Series>,
}

impl ChartSpec {
    /// Sequential vs. parallel comparison against `Repetition`.
    #[must_use]
    pub fn comparison(
        title: impl Into<String>,
        y_desc: impl Into<String>,
        sequential_column: impl Into<String>,
        parallel_column: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_column: crate::table::REPETITION_COLUMN.to_string(),
            x_desc: "Repetition Number".to_string(),
            y_desc: y_desc.into(),
            series: vec![
                Series::new(sequential_column, "Sequential"),
                Series::new(parallel_column, "Parallel"),
            ],
        }
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Plot(e.to_string())
}

/// Axis range covering `values` with 5% padding on both ends.
fn padded_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<std::ops::Range<f64>> {
    let (min, max) = values
        .into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| {
            Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
        })?;

    let pad = if (max - min).abs() < f64::EPSILON {
        1.0_f64.max(max.abs() * 0.05)
    } else {
        (max - min) * 0.05
    };
    Some((min - pad)..(max + pad))
}

/// Read a finished CSV and render it.
///
/// # Errors
///
/// Returns a read error if the CSV is missing or empty,
/// [`Error::MissingColumn`] / [`Error::Format`] if a configured column is
/// absent or non-numeric, and [`Error::Plot`] if drawing fails.
pub fn render_csv(csv: &Path, spec: &ChartSpec, style: ChartStyle, out: &Path) -> Result<()> {
    let table = Table::read_csv(csv)?;
    render_table(&table, spec, style, out)
}

/// Render `table` to a PNG at `out`, creating parent directories.
///
/// # Errors
///
/// See [`render_csv`].
pub fn render_table(table: &Table, spec: &ChartSpec, style: ChartStyle, out: &Path) -> Result<()> {
    let xs = table.f64_column(&spec.x_column)?;
    let series = spec
        .series
        .iter()
        .map(|s| table.f64_column(&s.column).map(|ys| (s, ys)))
        .collect::<Result<Vec<_>>>()?;

    let x_range = padded_range(&xs)
        .ok_or_else(|| Error::Plot(format!("{}: no finite x values", spec.title)))?;
    let y_range = padded_range(series.iter().flat_map(|(_, ys)| ys.iter()))
        .ok_or_else(|| Error::Plot(format!("{}: no finite y values", spec.title)))?;

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(spec.x_desc.as_str())
        .y_desc(spec.y_desc.as_str())
        .draw()
        .map_err(plot_err)?;

    for (idx, (s, ys)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();

        match style {
            ChartStyle::Line => {
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                    .map_err(plot_err)?
                    .label(s.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                chart
                    .draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
                    .map_err(plot_err)?;
            }
            ChartStyle::Scatter => {
                chart
                    .draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
                    .map_err(plot_err)?
                    .label(s.label.as_str())
                    .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::info!(path = %out.display(), title = %spec.title, "wrote chart");

    Ok(())
}
