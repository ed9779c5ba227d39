//! Per-client event timelines.
//!
//! A timeline is every event of one client, sorted by timestamp, paired with the
//! gap (in minutes) since the previous event. The first gap is always zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::event::Event;
use crate::types::ClientId;

/// One client's events in timestamp order, with inter-event gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    client_id: ClientId,
    events: Vec<Event>,
    gaps: Vec<f64>,
}

impl Timeline {
    /// Builds a timeline from one client's events in any order.
    ///
    /// The sort is stable, so events sharing a timestamp keep their input order.
    pub fn build(client_id: ClientId, mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.timestamp);

        let gaps = std::iter::once(0.0)
            .chain(
                events
                    .windows(2)
                    .map(|pair| gap_minutes(pair[0].timestamp, pair[1].timestamp)),
            )
            .take(events.len())
            .collect();

        Self {
            client_id,
            events,
            gaps,
        }
    }

    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Gaps in minutes; `gaps()[i]` is the time between event `i - 1` and event `i`.
    pub fn gaps(&self) -> &[f64] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Elapsed minutes from `earlier` to `later`. Negative spans count as zero.
pub fn gap_minutes(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier)
        .to_std()
        .map_or(0.0, |elapsed| elapsed.as_secs_f64() / 60.0)
}

/// Groups events by client and builds one timeline per client.
///
/// Timelines come back ordered by client ID so repeated runs over the same events
/// produce identical output.
pub fn build_timelines(events: impl IntoIterator<Item = Event>) -> Vec<Timeline> {
    let mut by_client: BTreeMap<ClientId, Vec<Event>> = BTreeMap::new();
    for event in events {
        by_client
            .entry(event.client_id.clone())
            .or_default()
            .push(event);
    }

    let timelines: Vec<Timeline> = by_client
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(client_id, events)| Timeline::build(client_id, events))
        .collect();

    tracing::debug!(clients = timelines.len(), "built client timelines");
    timelines
}
