//! Multi-window session-size sweep.
//!
//! For every candidate window `1..=max_window` (whole minutes), each timeline is
//! re-cut into sessions and every session is tallied by its count of distinct
//! resources. Tallies from different clients are summed element-wise, which is
//! associative and commutative, so per-client sweeps reduce in any order.

use rayon::prelude::*;
use serde::Serialize;

use crate::sessionize::{SessionSpans, unique_resources};
use crate::timeline::Timeline;

/// Number of session-size buckets: 1, 2, 3, 4, 5 and 6+ distinct resources.
pub const SIZE_BUCKETS: usize = 6;

/// Slot holding the total session count.
pub const TOTAL_SLOT: usize = SIZE_BUCKETS;

/// Session counts by distinct-resource count, plus the total.
///
/// Slots `0..5` count sessions with exactly `slot + 1` distinct resources, slot 5 counts
/// sessions with six or more, and slot 6 counts every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionSizeHistogram([u64; SIZE_BUCKETS + 1]);

impl SessionSizeHistogram {
    pub const fn from_counts(counts: [u64; SIZE_BUCKETS + 1]) -> Self {
        Self(counts)
    }

    /// Bucket index for a session with `unique` distinct resources.
    pub fn bucket_for(unique: usize) -> usize {
        unique.clamp(1, SIZE_BUCKETS) - 1
    }

    /// Tallies one session.
    pub fn record(&mut self, unique: usize) {
        self.0[Self::bucket_for(unique)] += 1;
        self.0[TOTAL_SLOT] += 1;
    }

    /// Element-wise sum.
    #[must_use]
    pub fn combine(mut self, other: Self) -> Self {
        for (slot, add) in self.0.iter_mut().zip(other.0) {
            *slot += add;
        }
        self
    }

    pub const fn counts(&self) -> &[u64; SIZE_BUCKETS + 1] {
        &self.0
    }

    pub const fn count(&self, bucket: usize) -> u64 {
        self.0[bucket]
    }

    pub const fn total(&self) -> u64 {
        self.0[TOTAL_SLOT]
    }

    /// Share of sessions in `bucket`, as a percentage. Absent when no sessions exist.
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self, bucket: usize) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(100.0 * self.0[bucket] as f64 / total as f64)
    }
}

/// One histogram per candidate window; index `i` holds window `i + 1` minutes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WindowSweep {
    histograms: Vec<SessionSizeHistogram>,
}

impl WindowSweep {
    /// An all-zero sweep over windows `1..=max_window`.
    pub fn empty(max_window: u32) -> Self {
        Self {
            histograms: vec![SessionSizeHistogram::default(); max_window as usize],
        }
    }

    pub const fn from_histograms(histograms: Vec<SessionSizeHistogram>) -> Self {
        Self { histograms }
    }

    /// Sweeps one client's timeline across windows `1..=max_window`.
    pub fn for_timeline(timeline: &Timeline, max_window: u32) -> Self {
        let histograms = (1..=max_window)
            .map(|window| {
                let mut histogram = SessionSizeHistogram::default();
                for span in SessionSpans::new(timeline.gaps(), f64::from(window)) {
                    histogram.record(unique_resources(&timeline.events()[span]));
                }
                histogram
            })
            .collect();
        Self { histograms }
    }

    /// Element-wise sum of two sweeps. The shorter one is treated as zero-padded.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        let (mut longer, shorter) = if self.histograms.len() >= other.histograms.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (slot, add) in longer.histograms.iter_mut().zip(shorter.histograms) {
            *slot = slot.combine(add);
        }
        longer
    }

    pub fn histograms(&self) -> &[SessionSizeHistogram] {
        &self.histograms
    }

    /// Histogram for a window in minutes, if it was swept.
    pub fn histogram(&self, window: u32) -> Option<&SessionSizeHistogram> {
        (window as usize)
            .checked_sub(1)
            .and_then(|i| self.histograms.get(i))
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Percentage of sessions in `bucket` for each window, in window order.
    pub fn percentage_series(&self, bucket: usize) -> Vec<Option<f64>> {
        self.histograms.iter().map(|h| h.percentage(bucket)).collect()
    }

    /// Percentage series for every size bucket; entry `b` is `percentage_series(b)`.
    pub fn bucket_series(&self) -> Vec<Vec<Option<f64>>> {
        (0..SIZE_BUCKETS).map(|b| self.percentage_series(b)).collect()
    }

    /// `(index, percentage)` pairs for `bucket` within `radius` indices of `index`.
    pub fn neighborhood(&self, bucket: usize, index: usize, radius: usize) -> Vec<(usize, Option<f64>)> {
        let start = index.saturating_sub(radius);
        let end = index.saturating_add(radius).saturating_add(1).min(self.histograms.len());
        (start..end)
            .map(|i| (i, self.histograms[i].percentage(bucket)))
            .collect()
    }
}

/// Sweeps every timeline and sums the per-client results.
pub fn sweep(timelines: &[Timeline], max_window: u32) -> WindowSweep {
    let result = timelines
        .par_iter()
        .map(|timeline| WindowSweep::for_timeline(timeline, max_window))
        .reduce(|| WindowSweep::empty(max_window), WindowSweep::combine);

    tracing::debug!(
        clients = timelines.len(),
        max_window,
        "swept candidate session windows"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::types::ClientId;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 7, 22, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn timeline(client: &str, points: &[(i64, &str)]) -> Timeline {
        let client = ClientId::new(client).unwrap();
        let events = points
            .iter()
            .map(|&(m, r)| Event::new(client.clone(), ts(m), r))
            .collect();
        Timeline::build(client, events)
    }

    #[test]
    fn test_bucket_for_clamps_large_sessions() {
        assert_eq!(SessionSizeHistogram::bucket_for(1), 0);
        assert_eq!(SessionSizeHistogram::bucket_for(5), 4);
        assert_eq!(SessionSizeHistogram::bucket_for(6), 5);
        assert_eq!(SessionSizeHistogram::bucket_for(60), 5);
    }

    #[test]
    fn test_record_updates_bucket_and_total() {
        let mut h = SessionSizeHistogram::default();
        h.record(1);
        h.record(1);
        h.record(9);
        assert_eq!(h.counts(), &[2, 0, 0, 0, 0, 1, 3]);
        assert_eq!(h.total(), 3);
    }

    #[test]
    fn test_percentage_absent_without_sessions() {
        let h = SessionSizeHistogram::default();
        assert_eq!(h.percentage(0), None);

        let h = SessionSizeHistogram::from_counts([1, 3, 0, 0, 0, 0, 4]);
        assert_eq!(h.percentage(0), Some(25.0));
        assert_eq!(h.percentage(1), Some(75.0));
    }

    #[test]
    fn test_sweep_single_timeline_per_window() {
        // Gaps: 0, 1, 3 -> window 1 splits everything, window 2 joins A-B,
        // window 4 joins all three.
        let tl = timeline("a", &[(0, "A"), (1, "B"), (4, "C")]);
        let sweep = WindowSweep::for_timeline(&tl, 4);

        assert_eq!(sweep.len(), 4);
        assert_eq!(sweep.histogram(1).unwrap().counts(), &[3, 0, 0, 0, 0, 0, 3]);
        assert_eq!(sweep.histogram(2).unwrap().counts(), &[1, 1, 0, 0, 0, 0, 2]);
        assert_eq!(sweep.histogram(3).unwrap().counts(), &[1, 1, 0, 0, 0, 0, 2]);
        assert_eq!(sweep.histogram(4).unwrap().counts(), &[0, 0, 1, 0, 0, 0, 1]);
        assert!(sweep.histogram(0).is_none());
        assert!(sweep.histogram(5).is_none());
    }

    #[test]
    fn test_combine_is_order_independent() {
        let a = WindowSweep::for_timeline(&timeline("a", &[(0, "A"), (2, "B")]), 3);
        let b = WindowSweep::for_timeline(&timeline("b", &[(0, "X"), (10, "X"), (11, "Y")]), 3);

        let ab = a.clone().combine(b.clone());
        let ba = b.combine(a);
        assert_eq!(ab, ba);
        assert_eq!(ab.histogram(1).unwrap().total(), 5);
    }

    #[test]
    fn test_combine_pads_shorter_sweep() {
        let long = WindowSweep::from_histograms(vec![
            SessionSizeHistogram::from_counts([1, 0, 0, 0, 0, 0, 1]),
            SessionSizeHistogram::from_counts([1, 0, 0, 0, 0, 0, 1]),
        ]);
        let short = WindowSweep::from_histograms(vec![SessionSizeHistogram::from_counts([
            0, 1, 0, 0, 0, 0, 1,
        ])]);

        let combined = short.combine(long);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined.histograms()[0].counts(), &[1, 1, 0, 0, 0, 0, 2]);
        assert_eq!(combined.histograms()[1].counts(), &[1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_sweep_reduces_across_clients() {
        let timelines = vec![
            timeline("a", &[(0, "A"), (2, "B")]),
            timeline("b", &[(0, "X")]),
        ];
        let result = sweep(&timelines, 3);

        assert_eq!(result.histogram(1).unwrap().counts(), &[3, 0, 0, 0, 0, 0, 3]);
        assert_eq!(result.histogram(3).unwrap().counts(), &[1, 1, 0, 0, 0, 0, 2]);
    }

    #[test]
    fn test_sweep_without_timelines_is_all_zero() {
        let result = sweep(&[], 5);
        assert_eq!(result.len(), 5);
        assert!(result.percentage_series(0).iter().all(Option::is_none));
    }

    #[test]
    fn test_neighborhood_clips_to_range() {
        let sweep = WindowSweep::from_histograms(
            (0..4)
                .map(|i| SessionSizeHistogram::from_counts([i, 4 - i, 0, 0, 0, 0, 4]))
                .collect(),
        );

        let around_start = sweep.neighborhood(0, 0, 2);
        assert_eq!(around_start, [(0, Some(0.0)), (1, Some(25.0)), (2, Some(50.0))]);

        let around_end = sweep.neighborhood(0, 3, 5);
        assert_eq!(around_end.first().map(|p| p.0), Some(0));
        assert_eq!(around_end.last().map(|p| p.0), Some(3));
    }

    #[test]
    fn test_neighborhood_with_unbounded_radius() {
        let sweep = WindowSweep::from_histograms(vec![
            SessionSizeHistogram::from_counts([1, 0, 0, 0, 0, 0, 1]),
            SessionSizeHistogram::from_counts([0, 1, 0, 0, 0, 0, 1]),
        ]);

        let all = sweep.neighborhood(0, 1, usize::MAX);
        assert_eq!(all, [(0, Some(100.0)), (1, Some(0.0))]);
        assert!(sweep.neighborhood(0, usize::MAX, usize::MAX).len() <= 2);
    }

    #[test]
    fn test_bucket_series_has_one_series_per_bucket() {
        let sweep = WindowSweep::for_timeline(&timeline("a", &[(0, "A")]), 2);
        let series = sweep.bucket_series();
        assert_eq!(series.len(), SIZE_BUCKETS);
        assert_eq!(series[0], [Some(100.0), Some(100.0)]);
        assert_eq!(series[5], [Some(0.0), Some(0.0)]);
    }
}
