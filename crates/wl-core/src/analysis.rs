//! End-to-end sessionization pipeline.
//!
//! # Algorithm
//!
//! 1. Group events by client and build one timeline per client
//! 2. If the window is to be discovered, sweep windows `1..=max_window`, reduce the
//!    per-client histograms, and ask the selector for candidate windows
//! 3. Sessionize every timeline with the chosen window
//! 4. Aggregate session, client and run-wide metrics
//!
//! Per-client work runs in parallel with rayon. Clients are handled in ID order, so the
//! same events and configuration always produce the same analysis.

use rayon::prelude::*;
use serde::Serialize;

use crate::event::Event;
use crate::metrics::{MetricsReport, aggregate};
use crate::select::{FirstUptick, WindowSelector, recommended_window};
use crate::sessionize::{Session, sessionize};
use crate::sweep::{WindowSweep, sweep};
use crate::timeline::{Timeline, build_timelines};

/// Default session window in minutes.
pub const DEFAULT_WINDOW_MINUTES: f64 = 15.0;

/// Default largest candidate window for discovery, in minutes.
pub const DEFAULT_MAX_WINDOW: u32 = 40;

/// How the session window is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowPolicy {
    /// Use this many minutes.
    Fixed(f64),
    /// Sweep candidate windows and pick one, using `fallback` minutes if none qualifies.
    Discover { fallback: f64 },
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub window: WindowPolicy,
    /// Largest candidate window swept during discovery.
    pub max_window: u32,
    /// Number of cohorts the default selector looks for.
    pub cohort_count: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: WindowPolicy::Discover {
                fallback: DEFAULT_WINDOW_MINUTES,
            },
            max_window: DEFAULT_MAX_WINDOW,
            cohort_count: 2,
        }
    }
}

/// Where the chosen window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    Fixed,
    Discovered,
    Fallback,
}

impl WindowSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Discovered => "discovered",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for WindowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sweep output kept for reporting and plotting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep: WindowSweep,
    /// Indices returned by the selector; index `i` is a window of `i + 1` minutes.
    pub selected: Vec<usize>,
}

impl SweepReport {
    /// The first selected window in minutes, if any.
    pub fn recommended_window(&self) -> Option<f64> {
        self.selected.first().copied().map(recommended_window)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub client_count: usize,
    pub chosen_window: f64,
    pub window_source: WindowSource,
    pub sweep: Option<SweepReport>,
    /// Sessions ordered by client ID, then by time.
    pub sessions: Vec<Session>,
    pub metrics: MetricsReport,
}

/// Runs the full pipeline with the default first-uptick selector.
pub fn analyze(events: impl IntoIterator<Item = Event>, config: &AnalysisConfig) -> Analysis {
    let selector = FirstUptick::with_cohort_count(config.cohort_count);
    analyze_with(events, config, &selector)
}

/// Runs the full pipeline with a caller-supplied window selector.
pub fn analyze_with<S: WindowSelector + ?Sized>(
    events: impl IntoIterator<Item = Event>,
    config: &AnalysisConfig,
    selector: &S,
) -> Analysis {
    let timelines = build_timelines(events);

    let (chosen_window, window_source, sweep_report) = match config.window {
        WindowPolicy::Fixed(window) => (window, WindowSource::Fixed, None),
        WindowPolicy::Discover { fallback } => {
            let report = discover(&timelines, config.max_window, selector);
            match report.recommended_window() {
                Some(window) => (window, WindowSource::Discovered, Some(report)),
                None => (fallback, WindowSource::Fallback, Some(report)),
            }
        }
    };

    tracing::info!(
        window_minutes = chosen_window,
        source = %window_source,
        "session window chosen"
    );

    let sessions = sessionize_all(&timelines, chosen_window);
    let metrics = aggregate(&sessions);

    Analysis {
        client_count: timelines.len(),
        chosen_window,
        window_source,
        sweep: sweep_report,
        sessions,
        metrics,
    }
}

/// Sweeps candidate windows and runs the selector over the result.
pub fn discover<S: WindowSelector + ?Sized>(
    timelines: &[Timeline],
    max_window: u32,
    selector: &S,
) -> SweepReport {
    let sweep = sweep(timelines, max_window);
    let selected = selector.select(&sweep);
    tracing::debug!(?selected, "window selector finished");
    SweepReport { sweep, selected }
}

/// Sessionizes every timeline with the same window, preserving timeline order.
pub fn sessionize_all(timelines: &[Timeline], window: f64) -> Vec<Session> {
    let per_client: Vec<Vec<Session>> = timelines
        .par_iter()
        .map(|timeline| sessionize(timeline, window))
        .collect();
    per_client.into_iter().flatten().collect()
}
