use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::event::StatusEvent;
use crate::record::StatusRecord;
use crate::types::{DeliveryHandle, StatusDelivery, TimeRange};

/// Publish side of the durable queue.
/// Infrastructure layer (status-nats) implements this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusEventPublisher: Send + Sync {
    /// Durably publish one event with a producer-assigned send timestamp.
    async fn publish(&self, event: &StatusEvent) -> PipelineResult<()>;
}

/// Consume side of the durable queue.
///
/// A message fetched via `poll` must be settled exactly once through one of
/// `acknowledge`, `release`, or `reject`; until then it stays redeliverable
/// on the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusQueue: Send + Sync {
    /// Single non-blocking fetch. `Ok(None)` means the queue is empty,
    /// which is a normal outcome and not an error.
    async fn poll(&self) -> PipelineResult<Option<StatusDelivery>>;

    /// Confirm consumption. Only valid after the message's store write has
    /// durably succeeded; a crash before this call causes redelivery,
    /// never silent loss.
    async fn acknowledge(&self, handle: DeliveryHandle) -> PipelineResult<()>;

    /// Negative-ack: hand the message back to the broker for redelivery.
    async fn release(&self, handle: DeliveryHandle) -> PipelineResult<()>;

    /// Terminal negative-ack: drop the message with no redelivery. Used for
    /// payloads that will never decode.
    async fn reject(&self, handle: DeliveryHandle) -> PipelineResult<()>;
}

/// Persistent collection of status records.
/// Infrastructure layer (status-mongo) implements this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusRecordRepository: Send + Sync {
    /// Insert one record, returning its stored identifier.
    async fn insert(&self, record: &StatusRecord) -> PipelineResult<String>;

    /// Fetch one record by its stored identifier.
    async fn find_by_id(&self, id: &str) -> PipelineResult<Option<StatusRecord>>;

    /// Count records with `created_at` inside the window, grouped by status.
    async fn count_by_status(&self, range: TimeRange) -> PipelineResult<HashMap<String, u64>>;
}
