//! Session and client engagement metrics.
//!
//! Everything here is a pure aggregate over finished sessions. Run-wide totals are
//! computed as an explicit fold rather than accumulated through shared counters.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::sessionize::Session;
use crate::types::ClientId;

/// Engagement statistics for one client across all of its sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngagementRecord {
    /// Sum of per-session distinct resource counts.
    pub total_resources: u64,
    /// Sum of session durations in minutes.
    pub total_duration_minutes: f64,
    pub avg_resources_per_session: f64,
    pub avg_duration_per_session: f64,
    pub session_count: u64,
}

impl EngagementRecord {
    /// Builds a record from client totals. Returns `None` when `session_count` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_totals(total_resources: u64, total_duration_minutes: f64, session_count: u64) -> Option<Self> {
        if session_count == 0 {
            return None;
        }
        let count = session_count as f64;
        Some(Self {
            total_resources,
            total_duration_minutes,
            avg_resources_per_session: total_resources as f64 / count,
            avg_duration_per_session: total_duration_minutes / count,
            session_count,
        })
    }
}

/// Run-wide session totals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunTotals {
    pub total_sessions: u64,
    pub total_duration_minutes: f64,
}

impl RunTotals {
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            total_sessions: self.total_sessions + other.total_sessions,
            total_duration_minutes: self.total_duration_minutes + other.total_duration_minutes,
        }
    }

    /// Mean session duration in minutes, absent when there are no sessions.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_session_minutes(&self) -> Option<f64> {
        (self.total_sessions > 0)
            .then(|| self.total_duration_minutes / self.total_sessions as f64)
    }
}

/// Per-session figures used by the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub client_id: ClientId,
    pub unique_resources: usize,
    pub duration_minutes: f64,
}

impl From<&Session> for SessionStats {
    fn from(session: &Session) -> Self {
        Self {
            client_id: session.client_id.clone(),
            unique_resources: session.unique_resources(),
            duration_minutes: session.duration_minutes(),
        }
    }
}

/// All metrics derived from one sessionization.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MetricsReport {
    /// One entry per session, sorted by distinct resource count, largest first.
    pub unique_resources_by_session: Vec<(ClientId, usize)>,
    /// Total session minutes per client, largest first.
    pub duration_by_client: Vec<(ClientId, f64)>,
    /// Engagement per client, in client ID order.
    pub engagement: Vec<(ClientId, EngagementRecord)>,
    pub totals: RunTotals,
}

impl MetricsReport {
    /// The `n` clients with the longest total session time.
    pub fn top_engaged(&self, n: usize) -> &[(ClientId, f64)] {
        &self.duration_by_client[..n.min(self.duration_by_client.len())]
    }

    pub fn client_count(&self) -> usize {
        self.engagement.len()
    }
}

#[derive(Debug, Default)]
struct ClientTally {
    resources: u64,
    duration: f64,
    sessions: u64,
}

/// Aggregates finished sessions into per-session, per-client and run-wide metrics.
///
/// Ties in the sorted lists are broken by ascending client ID.
pub fn aggregate(sessions: &[Session]) -> MetricsReport {
    let stats: Vec<SessionStats> = sessions.par_iter().map(SessionStats::from).collect();

    let totals = stats
        .iter()
        .map(|s| RunTotals {
            total_sessions: 1,
            total_duration_minutes: s.duration_minutes,
        })
        .fold(RunTotals::default(), RunTotals::combine);

    let mut tallies: BTreeMap<&ClientId, ClientTally> = BTreeMap::new();
    for s in &stats {
        let tally = tallies.entry(&s.client_id).or_default();
        tally.resources += s.unique_resources as u64;
        tally.duration += s.duration_minutes;
        tally.sessions += 1;
    }

    let mut unique_resources_by_session: Vec<(ClientId, usize)> = stats
        .iter()
        .map(|s| (s.client_id.clone(), s.unique_resources))
        .collect();
    unique_resources_by_session.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut duration_by_client: Vec<(ClientId, f64)> = tallies
        .iter()
        .map(|(client, tally)| ((*client).clone(), tally.duration))
        .collect();
    duration_by_client.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let engagement = tallies
        .iter()
        .filter_map(|(client, tally)| {
            EngagementRecord::from_totals(tally.resources, tally.duration, tally.sessions)
                .map(|record| ((*client).clone(), record))
        })
        .collect();

    tracing::debug!(
        sessions = totals.total_sessions,
        clients = tallies.len(),
        "aggregated session metrics"
    );

    MetricsReport {
        unique_resources_by_session,
        duration_by_client,
        engagement,
        totals,
    }
}
