//! Optimal session-window selection.
//!
//! As the window grows, sessions merge and the share of single-resource sessions
//! generally falls. A window where that share rises again marks a change of regime:
//! merging further stops removing single-visit sessions proportionally, which points
//! at a separate cohort of session lengths. The first such window is the recommended
//! general-purpose default.

use crate::sweep::WindowSweep;

/// Picks candidate windows from a completed sweep.
///
/// Implementations return 0-based indices into the sweep; index `i` stands for a
/// window of `i + 1` minutes. An empty result means no recommendation, and callers
/// fall back to their own default window.
pub trait WindowSelector {
    fn select(&self, sweep: &WindowSweep) -> Vec<usize>;
}

/// Selects windows where a bucket's percentage rises over the previous window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstUptick {
    /// Size bucket whose percentage is scanned (0 = single-resource sessions).
    pub bucket: usize,
    /// Stop after this many upticks.
    pub cohort_count: usize,
}

impl Default for FirstUptick {
    fn default() -> Self {
        Self {
            bucket: 0,
            cohort_count: 2,
        }
    }
}

impl FirstUptick {
    pub const fn with_cohort_count(cohort_count: usize) -> Self {
        Self {
            bucket: 0,
            cohort_count,
        }
    }
}

impl WindowSelector for FirstUptick {
    fn select(&self, sweep: &WindowSweep) -> Vec<usize> {
        find_upticks(&sweep.percentage_series(self.bucket), self.cohort_count)
    }
}

/// Indices `k` where `series[k + 1] > series[k]`, scanning upward and stopping after
/// `cohort_count` hits. Pairs with an absent value are skipped.
pub fn find_upticks(series: &[Option<f64>], cohort_count: usize) -> Vec<usize> {
    series
        .windows(2)
        .enumerate()
        .filter_map(|(k, pair)| match (pair[0], pair[1]) {
            (Some(current), Some(next)) if next > current => Some(k),
            _ => None,
        })
        .take(cohort_count)
        .collect()
}

/// Window in minutes recommended by a selected sweep index.
#[allow(clippy::cast_precision_loss)]
pub fn recommended_window(index: usize) -> f64 {
    (index + 1) as f64
}
