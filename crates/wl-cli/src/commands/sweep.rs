//! Sweep command: show how the single-resource session share moves with the window.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use wl_core::{FirstUptick, SweepReport, build_timelines, discover, recommended_window};

use crate::config::Config;
use crate::ingest;

/// JSON form of the sweep command output.
#[derive(Debug, Serialize)]
pub struct SweepOutput {
    pub max_window: usize,
    /// Percentage of single-resource sessions for windows `1..=max_window`.
    pub single_resource_percentages: Vec<Option<f64>>,
    pub selected: Vec<usize>,
    pub recommended_window: Option<f64>,
}

impl From<&SweepReport> for SweepOutput {
    fn from(report: &SweepReport) -> Self {
        Self {
            max_window: report.sweep.len(),
            single_resource_percentages: report.sweep.percentage_series(0),
            selected: report.selected.clone(),
            recommended_window: report.recommended_window(),
        }
    }
}

/// Formats a sweep as a window/percentage table.
pub fn format_sweep(report: &SweepReport) -> String {
    let mut out = String::new();
    writeln!(out, "Window  Single-resource sessions").unwrap();

    for (index, pct) in report.sweep.percentage_series(0).iter().enumerate() {
        let marker = if report.selected.contains(&index) { "  <" } else { "" };
        match pct {
            Some(pct) => {
                writeln!(out, "{:>6}  {pct:>6.2}%{marker}", index + 1).unwrap();
            }
            None => {
                writeln!(out, "{:>6}  {:>7}{marker}", index + 1, "n/a").unwrap();
            }
        }
    }

    match report.recommended_window() {
        Some(window) => {
            writeln!(out, "Recommended window: {window} min").unwrap();
        }
        None => {
            writeln!(out, "No recommended window: share never rises").unwrap();
        }
    }
    out
}

/// Runs the window sweep over `log` and writes the result to `writer`.
pub fn run<W: Write>(writer: &mut W, config: &Config, log: &Path, json: bool) -> Result<()> {
    let (events, _stats) = ingest::read_events(log, config.fields)
        .with_context(|| format!("failed to ingest {}", log.display()))?;

    let timelines = build_timelines(events);
    let selector = FirstUptick::with_cohort_count(config.cohort_count);
    let report = discover(&timelines, config.max_window, &selector);

    if let Some(index) = report.selected.first() {
        tracing::info!(
            window_minutes = recommended_window(*index),
            "optimal session window found"
        );
    }

    if json {
        serde_json::to_writer_pretty(&mut *writer, &SweepOutput::from(&report))?;
        writeln!(writer)?;
    } else {
        writer.write_all(format_sweep(&report).as_bytes())?;
    }
    Ok(())
}
