//! Analyze command: ingest, sessionize, persist reports, print a run summary.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use wl_core::{Analysis, WindowSource, analyze, recommended_window};

use crate::config::Config;
use crate::ingest::{self, IngestStats};
use crate::output;

/// Flags for a single analyze run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub json: bool,
    pub write_reports: bool,
}

/// A client and its total session time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagedClient {
    pub client: String,
    pub total_minutes: f64,
}

/// Run-wide figures printed after an analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub window_minutes: f64,
    pub window_source: WindowSource,
    /// Every window the selector proposed, first is the one used.
    pub candidate_windows: Vec<f64>,
    pub log_lines: usize,
    pub skipped_lines: usize,
    pub clients: usize,
    pub total_sessions: u64,
    pub total_session_minutes: f64,
    pub average_session_minutes: Option<f64>,
    pub top_engaged: Vec<EngagedClient>,
}

impl Summary {
    pub fn new(analysis: &Analysis, stats: IngestStats, top_clients: usize) -> Self {
        let totals = analysis.metrics.totals;
        Self {
            window_minutes: analysis.chosen_window,
            window_source: analysis.window_source,
            candidate_windows: analysis
                .sweep
                .as_ref()
                .map(|report| report.selected.iter().copied().map(recommended_window).collect())
                .unwrap_or_default(),
            log_lines: stats.lines,
            skipped_lines: stats.skipped,
            clients: analysis.client_count,
            total_sessions: totals.total_sessions,
            total_session_minutes: totals.total_duration_minutes,
            average_session_minutes: totals.average_session_minutes(),
            top_engaged: analysis
                .metrics
                .top_engaged(top_clients)
                .iter()
                .map(|(client, minutes)| EngagedClient {
                    client: client.to_string(),
                    total_minutes: *minutes,
                })
                .collect(),
        }
    }
}

/// Formats the summary for terminal output.
pub fn format_summary(summary: &Summary) -> String {
    let mut out = String::new();

    writeln!(
        out,
        "Session window: {} min ({})",
        summary.window_minutes, summary.window_source
    )
    .unwrap();
    if !summary.candidate_windows.is_empty() {
        let candidates: Vec<String> = summary
            .candidate_windows
            .iter()
            .map(ToString::to_string)
            .collect();
        writeln!(out, "Candidate windows: {} min", candidates.join(", ")).unwrap();
    }
    writeln!(
        out,
        "Log lines: {} read, {} skipped",
        summary.log_lines, summary.skipped_lines
    )
    .unwrap();
    writeln!(out, "Clients: {}", summary.clients).unwrap();
    writeln!(out, "Total sessions: {}", summary.total_sessions).unwrap();
    writeln!(
        out,
        "Sum of session times: {:.2} min",
        summary.total_session_minutes
    )
    .unwrap();
    match summary.average_session_minutes {
        Some(avg) => {
            writeln!(out, "Average session time: {avg:.2} min").unwrap();
        }
        None => {
            writeln!(out, "Average session time: n/a").unwrap();
        }
    }

    if !summary.top_engaged.is_empty() {
        let width = summary
            .top_engaged
            .iter()
            .map(|c| c.client.len())
            .max()
            .unwrap_or(0);
        writeln!(out).unwrap();
        writeln!(out, "Most engaged clients (total session minutes):").unwrap();
        for client in &summary.top_engaged {
            writeln!(
                out,
                "  {:<width$}  {:>8.2}",
                client.client, client.total_minutes
            )
            .unwrap();
        }
    }

    out
}

/// Runs the full pipeline over `log` and writes the summary to `writer`.
pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    log: &Path,
    options: AnalyzeOptions,
) -> Result<()> {
    let (events, stats) = ingest::read_events(log, config.fields)
        .with_context(|| format!("failed to ingest {}", log.display()))?;

    let analysis = analyze(events, &config.analysis_config());

    if options.write_reports {
        let written = output::write_reports(&config.output_dir, &analysis)
            .context("failed to write report files")?;
        tracing::info!(
            dir = ?config.output_dir,
            files = written.len(),
            "reports written"
        );
    }

    let summary = Summary::new(&analysis, stats, config.top_clients);
    if options.json {
        serde_json::to_writer_pretty(&mut *writer, &summary)?;
        writeln!(writer)?;
    } else {
        writer.write_all(format_summary(&summary).as_bytes())?;
    }

    Ok(())
}
