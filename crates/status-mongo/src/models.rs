use mongodb::bson;
use serde::{Deserialize, Serialize};
use status_domain::StatusRecord;

/// Document shape of a persisted status record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecordDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: String,
    pub created_at: bson::DateTime,
    /// Broker stream sequence, kept as a downstream idempotency key.
    pub stream_sequence: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<&StatusRecord> for StatusRecordDocument {
    fn from(record: &StatusRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.clone(),
            created_at: bson::DateTime::from_chrono(record.created_at),
            stream_sequence: record.stream_sequence as i64,
            extra: record.extra.clone(),
        }
    }
}

impl From<StatusRecordDocument> for StatusRecord {
    fn from(document: StatusRecordDocument) -> Self {
        Self {
            id: document.id,
            status: document.status,
            created_at: document.created_at.to_chrono(),
            stream_sequence: document.stream_sequence.max(0) as u64,
            extra: document.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use status_domain::StatusEvent;

    #[test]
    fn maps_record_fields_onto_the_document() {
        let mut event = StatusEvent::new(3);
        event
            .extra
            .insert("region".to_string(), serde_json::json!("eu-west-1"));

        let delivered_at = DateTime::from_timestamp(100, 0).unwrap();
        let record = StatusRecord::from_event(&event, delivered_at, 42);
        let document = StatusRecordDocument::from(&record);

        assert_eq!(document.id, record.id);
        assert_eq!(document.status, "3");
        assert_eq!(document.created_at.to_chrono(), delivered_at);
        assert_eq!(document.stream_sequence, 42);
        assert_eq!(document.extra.get("region"), Some(&serde_json::json!("eu-west-1")));
    }

    #[test]
    fn document_round_trips_back_into_a_record() {
        let mut event = StatusEvent::new(6);
        event
            .extra
            .insert("probe".to_string(), serde_json::json!("p-1"));

        let record = StatusRecord::from_event(
            &event,
            DateTime::from_timestamp(250, 0).unwrap(),
            11,
        );
        let restored = StatusRecord::from(StatusRecordDocument::from(&record));

        assert_eq!(restored, record);
    }

    #[test]
    fn id_serializes_under_the_mongo_primary_key() {
        let record = StatusRecord::from_event(
            &StatusEvent::new(1),
            DateTime::from_timestamp(0, 0).unwrap(),
            1,
        );
        let document = StatusRecordDocument::from(&record);

        let serialized = bson::to_document(&document).unwrap();
        assert_eq!(serialized.get_str("_id").unwrap(), record.id);
        assert!(serialized.get("id").is_none());
    }
}
