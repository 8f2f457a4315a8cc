use std::sync::Arc;

use tracing::{debug, info};

use crate::error::PipelineResult;
use crate::event::StatusEvent;
use crate::record::StatusRecord;
use crate::repository::StatusRecordRepository;
use crate::types::StatusDelivery;

/// Domain service that turns one delivery into one persisted record.
///
/// Flow:
/// 1. Decode the body as a structural-JSON StatusEvent
/// 2. Build a StatusRecord with `created_at` from the delivery timestamp
/// 3. Insert via the repository trait
///
/// Acknowledgment policy stays with the caller: this service only reports
/// whether the write happened.
pub struct StatusRecordService {
    repository: Arc<dyn StatusRecordRepository>,
}

impl StatusRecordService {
    pub fn new(repository: Arc<dyn StatusRecordRepository>) -> Self {
        Self { repository }
    }

    pub async fn process_delivery(&self, delivery: &StatusDelivery) -> PipelineResult<StatusRecord> {
        let event = StatusEvent::from_slice(&delivery.payload)?;

        let record = StatusRecord::from_event(
            &event,
            delivery.delivered_at,
            delivery.handle.stream_sequence,
        );

        debug!(
            record_id = %record.id,
            status = %record.status,
            stream_sequence = record.stream_sequence,
            "Storing status record"
        );

        let id = self.repository.insert(&record).await?;

        info!(
            record_id = %id,
            status = %record.status,
            "Stored status record"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::repository::MockStatusRecordRepository;
    use crate::types::DeliveryHandle;
    use chrono::{DateTime, Utc};

    fn delivery(payload: &[u8], timestamp: i64, sequence: u64) -> StatusDelivery {
        StatusDelivery {
            payload: payload.to_vec(),
            delivered_at: DateTime::from_timestamp(timestamp, 0).unwrap(),
            handle: DeliveryHandle {
                reply_subject: "$JS.ACK.test.1".to_string(),
                stream_sequence: sequence,
            },
        }
    }

    #[tokio::test]
    async fn persists_decoded_event_with_delivery_timestamp() {
        let mut repository = MockStatusRecordRepository::new();
        repository
            .expect_insert()
            .withf(|record: &StatusRecord| {
                record.status == "3"
                    && record.created_at == DateTime::<Utc>::from_timestamp(100, 0).unwrap()
                    && record.stream_sequence == 9
            })
            .times(1)
            .returning(|record| Ok(record.id.clone()));

        let service = StatusRecordService::new(Arc::new(repository));
        let record = service
            .process_delivery(&delivery(br#"{"status": 3}"#, 100, 9))
            .await
            .unwrap();

        assert_eq!(record.status, "3");
        assert_eq!(record.created_at.timestamp(), 100);
    }

    #[tokio::test]
    async fn malformed_payload_never_reaches_the_store() {
        let mut repository = MockStatusRecordRepository::new();
        repository.expect_insert().times(0);

        let service = StatusRecordService::new(Arc::new(repository));
        let result = service
            .process_delivery(&delivery(b"{not json", 100, 1))
            .await;

        assert!(matches!(result, Err(PipelineError::MessageDecode(_))));
    }

    #[tokio::test]
    async fn store_failure_is_propagated() {
        let mut repository = MockStatusRecordRepository::new();
        repository
            .expect_insert()
            .times(1)
            .returning(|_| Err(PipelineError::StoreWrite(anyhow::anyhow!("connection reset"))));

        let service = StatusRecordService::new(Arc::new(repository));
        let result = service
            .process_delivery(&delivery(br#"{"status": 1}"#, 100, 1))
            .await;

        assert!(matches!(result, Err(PipelineError::StoreWrite(_))));
    }

    #[tokio::test]
    async fn extra_payload_fields_are_persisted() {
        let mut repository = MockStatusRecordRepository::new();
        repository
            .expect_insert()
            .withf(|record: &StatusRecord| {
                record.extra.get("origin") == Some(&serde_json::json!("probe-7"))
            })
            .times(1)
            .returning(|record| Ok(record.id.clone()));

        let service = StatusRecordService::new(Arc::new(repository));
        service
            .process_delivery(&delivery(br#"{"status": 2, "origin": "probe-7"}"#, 50, 2))
            .await
            .unwrap();
    }
}
