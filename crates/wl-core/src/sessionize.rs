//! Windowed sessionization.
//!
//! A session is a maximal run of consecutive timeline events where every internal gap
//! is strictly below the session window. A gap equal to or above the window starts a
//! new session, and the first gap of every session is reset to zero.

use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::Event;
use crate::timeline::Timeline;
use crate::types::ClientId;

/// A burst of activity from one client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub client_id: ClientId,
    pub events: Vec<Event>,
    /// Gaps in minutes between consecutive events; the first is always zero.
    pub gaps: Vec<f64>,
}

impl Session {
    /// Total session length in minutes (the sum of its gaps).
    pub fn duration_minutes(&self) -> f64 {
        self.gaps.iter().sum()
    }

    /// Number of distinct resources requested in this session.
    pub fn unique_resources(&self) -> usize {
        unique_resources(&self.events)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Counts distinct resources in a run of events.
pub fn unique_resources(events: &[Event]) -> usize {
    events
        .iter()
        .map(|e| e.resource.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Returns true when a gap closes the current session.
///
/// A window of zero or below therefore puts every event in its own session.
fn starts_session(gap: f64, window: f64) -> bool {
    gap >= window
}

/// Index ranges of the sessions a gap sequence splits into.
///
/// Yields nothing for an empty sequence; otherwise the ranges are contiguous,
/// non-empty, and cover `0..gaps.len()`.
#[derive(Debug, Clone)]
pub struct SessionSpans<'a> {
    gaps: &'a [f64],
    window: f64,
    start: usize,
}

impl<'a> SessionSpans<'a> {
    pub const fn new(gaps: &'a [f64], window: f64) -> Self {
        Self {
            gaps,
            window,
            start: 0,
        }
    }
}

impl Iterator for SessionSpans<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.gaps.len() {
            return None;
        }

        let begin = self.start;
        let end = self.gaps[begin + 1..]
            .iter()
            .position(|&gap| starts_session(gap, self.window))
            .map_or(self.gaps.len(), |offset| begin + 1 + offset);

        self.start = end;
        Some(begin..end)
    }
}

/// Splits a timeline into sessions using `window` minutes of inactivity.
///
/// Every event lands in exactly one session, in timestamp order.
pub fn sessionize(timeline: &Timeline, window: f64) -> Vec<Session> {
    SessionSpans::new(timeline.gaps(), window)
        .map(|span| {
            let mut gaps = timeline.gaps()[span.clone()].to_vec();
            gaps[0] = 0.0;
            Session {
                client_id: timeline.client_id().clone(),
                events: timeline.events()[span].to_vec(),
                gaps,
            }
        })
        .collect()
}
