//! Per-participant figure rendering.
//!
//! Each participant gets a two-panel fill chart: water input above in
//! cornflower blue, produce yield below in lime green, sharing the date
//! axis. Figures land in a run directory named after the last observation
//! date, as `{participant}_line.png`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::warn;

use crate::models::{DateAxis, ParticipantFailure, ParticipantSeries};
use crate::stats;
use crate::table::NormalizedTable;

const WATER_COLOR: RGBColor = RGBColor(100, 149, 237);
const PRODUCE_COLOR: RGBColor = RGBColor(50, 205, 50);

const FIGURE_WIDTH: u32 = 1000;
const FIGURE_HEIGHT: u32 = 460;

/// Run output directory, named after the last observation date:
/// `YYYY-MM-DD_out`. `None` when the axis is empty.
pub fn out_dir_name(axis: &DateAxis) -> Option<String> {
    axis.last_date()
        .map(|date| format!("{}_out", date.format("%Y-%m-%d")))
}

pub fn figure_path(out_dir: &Path, participant: &str) -> PathBuf {
    out_dir.join(format!("{participant}_line.png"))
}

/// Figures rendered by one batch run.
#[derive(Debug)]
pub struct FigureSet {
    pub dir: PathBuf,
    pub figures: Vec<(String, PathBuf)>,
    pub failures: Vec<ParticipantFailure>,
}

/// Render every participant's figure into the dated run directory under
/// `parent`. A participant whose series cannot be assembled is skipped
/// with the reason retained, matching the aggregator policy.
pub fn render_batch(table: &NormalizedTable, axis: &DateAxis, parent: &Path) -> Result<FigureSet> {
    let dir_name = out_dir_name(axis).context("table has no date columns")?;
    let dir = parent.join(dir_name);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut figures = Vec::new();
    let mut failures = Vec::new();
    for participant in table.participants() {
        match stats::participant_series(table, axis, participant) {
            Ok(series) => {
                let path = render_line_figure(&dir, axis, &series)
                    .with_context(|| format!("rendering figure for participant {participant}"))?;
                figures.push((participant.to_string(), path));
            }
            Err(error) => {
                warn!(participant, %error, "skipping figure");
                failures.push(ParticipantFailure {
                    participant: participant.to_string(),
                    error,
                });
            }
        }
    }

    Ok(FigureSet {
        dir,
        figures,
        failures,
    })
}

/// Render one participant's two-panel figure and return its path.
pub fn render_line_figure(
    out_dir: &Path,
    axis: &DateAxis,
    series: &ParticipantSeries,
) -> Result<PathBuf> {
    let (first, last) = match (axis.dates.first(), axis.dates.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => bail!("date axis is empty"),
    };

    let path = figure_path(out_dir, &series.participant);
    {
        let root = BitMapBackend::new(&path, (FIGURE_WIDTH, FIGURE_HEIGHT)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(
            &format!("Garden Statistics for {}", series.participant),
            ("sans-serif", 24),
        )?;
        let (upper, lower) = root.split_vertically(200);

        draw_panel(
            &upper,
            first..last,
            &axis.dates,
            &series.water,
            WATER_COLOR,
            "Water Input (Gallon)",
            false,
        )?;
        draw_panel(
            &lower,
            first..last,
            &axis.dates,
            &series.produce,
            PRODUCE_COLOR,
            "Produce Yield (kg)",
            true,
        )?;

        root.present()?;
    }
    Ok(path)
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    x_range: std::ops::Range<NaiveDate>,
    dates: &[NaiveDate],
    values: &[Option<f64>],
    color: RGBColor,
    title: &str,
    with_x_labels: bool,
) -> Result<()> {
    let y_max = values
        .iter()
        .flatten()
        .fold(0.0f64, |acc, &v| acc.max(v))
        .max(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18).into_font().color(&color))
        .margin(10)
        .x_label_area_size(if with_x_labels { 30 } else { 0 })
        .y_label_area_size(45)
        .build_cartesian_2d(x_range, 0.0..y_max * 1.05)?;

    if with_x_labels {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(dates.len().min(12))
            .x_label_formatter(&|date: &NaiveDate| date.format("%b-%d").to_string())
            .y_labels(5)
            .draw()?;
    } else {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_x_axis()
            .y_labels(5)
            .draw()?;
    }

    // one fill per contiguous run of present values, so gaps stay gaps
    for run in present_runs(dates, values) {
        chart.draw_series(AreaSeries::new(run, 0.0, &color.mix(0.8)).border_style(&color))?;
    }

    Ok(())
}

fn present_runs(dates: &[NaiveDate], values: &[Option<f64>]) -> Vec<Vec<(NaiveDate, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (date, value) in dates.iter().zip(values) {
        match value {
            Some(v) => current.push((*date, *v)),
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn out_dir_is_named_after_the_last_date() {
        let axis = DateAxis {
            dates: vec![day(6, 5), day(6, 12)],
            labels: vec!["6/5".to_string(), "6/12".to_string()],
        };
        assert_eq!(out_dir_name(&axis).unwrap(), "2024-06-12_out");

        let empty = DateAxis {
            dates: vec![],
            labels: vec![],
        };
        assert!(empty.is_empty());
        assert_eq!(out_dir_name(&empty), None);
    }

    #[test]
    fn figure_path_uses_the_participant_id() {
        let path = figure_path(Path::new("2024-06-12_out"), "7");
        assert_eq!(path, Path::new("2024-06-12_out").join("7_line.png"));
    }

    #[test]
    fn fill_runs_break_at_missing_values() {
        let dates = [day(6, 5), day(6, 12), day(6, 19), day(6, 26)];
        let values = [Some(1.0), None, Some(3.0), Some(4.0)];

        let runs = present_runs(&dates, &values);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], vec![(day(6, 5), 1.0)]);
        assert_eq!(runs[1], vec![(day(6, 19), 3.0), (day(6, 26), 4.0)]);
    }
}
