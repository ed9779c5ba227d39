//! Parsed access-log events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ClientId;

/// A single request made by a client.
///
/// Events arrive already parsed; lines that could not be parsed never become events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Who made the request.
    pub client_id: ClientId,
    /// When the request was made.
    pub timestamp: DateTime<Utc>,
    /// What was requested (typically the request line or URL).
    pub resource: String,
}

impl Event {
    pub fn new(client_id: ClientId, timestamp: DateTime<Utc>, resource: impl Into<String>) -> Self {
        Self {
            client_id,
            timestamp,
            resource: resource.into(),
        }
    }
}
