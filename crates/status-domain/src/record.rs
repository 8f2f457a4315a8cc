use chrono::{DateTime, Utc};

use crate::event::StatusEvent;

/// Persisted form of a status event.
///
/// `created_at` is always the message's delivery timestamp, never the wall
/// clock of the processing host. `stream_sequence` carries the broker's
/// stream sequence so downstream readers have an idempotency key under
/// redelivery; the pipeline itself does not deduplicate on it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub stream_sequence: u64,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StatusRecord {
    pub fn from_event(
        event: &StatusEvent,
        delivered_at: DateTime<Utc>,
        stream_sequence: u64,
    ) -> Self {
        Self {
            id: xid::new().to_string(),
            status: event.status.to_string(),
            created_at: delivered_at,
            stream_sequence,
            extra: event.extra.clone(),
        }
    }
}
