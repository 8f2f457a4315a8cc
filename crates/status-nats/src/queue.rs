use std::time::Duration;

use anyhow::anyhow;
use async_nats::jetstream::{self, consumer::PullConsumer};
use async_nats::HeaderMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use status_domain::{
    DeliveryHandle, PipelineError, PipelineResult, StatusDelivery, StatusQueue,
};
use tracing::{debug, info, warn};

use crate::publisher::SENT_AT_HEADER;

// JetStream acknowledgment verbs, published to the delivery's reply subject.
const ACK: &str = "+ACK";
const NAK: &str = "-NAK";
const TERM: &str = "+TERM";

/// Pull-based queue client over a durable JetStream consumer with explicit
/// acknowledgment.
///
/// `poll` fetches at most one message; settling it goes back through the
/// delivery's reply subject, so the handle returned by `poll` is the only
/// path to the acknowledgment.
pub struct NatsStatusQueue {
    client: async_nats::Client,
    consumer: PullConsumer,
    max_wait: Duration,
}

impl NatsStatusQueue {
    /// Declare (or look up) the durable consumer. Idempotent, must run
    /// before the first poll.
    pub async fn new(
        client: async_nats::Client,
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        max_wait: Duration,
    ) -> PipelineResult<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .map_err(|e| PipelineError::QueueConnectivity(anyhow!(e)))?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            client,
            consumer,
            max_wait,
        })
    }

    async fn settle(&self, handle: &DeliveryHandle, verb: &'static str) -> Result<(), anyhow::Error> {
        self.client
            .publish(handle.reply_subject.clone(), verb.into())
            .await
            .map_err(|e| anyhow!(e))
    }
}

#[async_trait]
impl StatusQueue for NatsStatusQueue {
    async fn poll(&self) -> PipelineResult<Option<StatusDelivery>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(self.max_wait)
            .messages()
            .await
            .map_err(|e| PipelineError::Queue(anyhow!(e)))?;

        let Some(result) = batch.next().await else {
            return Ok(None);
        };
        let message = result.map_err(|e| PipelineError::Queue(anyhow!(e)))?;

        let reply = message
            .reply
            .clone()
            .ok_or_else(|| PipelineError::Queue(anyhow!("delivery is missing a reply subject")))?;

        let (stream_sequence, published) = {
            let info = message
                .info()
                .map_err(|e| PipelineError::Queue(anyhow!(e)))?;
            (info.stream_sequence, info.published)
        };

        let delivered_at = parse_sent_at(message.headers.as_ref())
            .or_else(|| DateTime::from_timestamp(published.unix_timestamp(), published.nanosecond()))
            .unwrap_or_else(|| {
                warn!(stream_sequence, "Delivery carries no usable timestamp, falling back to now");
                Utc::now()
            });

        debug!(
            stream_sequence,
            subject = %message.subject,
            size_bytes = message.payload.len(),
            "Fetched status message"
        );

        Ok(Some(StatusDelivery {
            payload: message.payload.to_vec(),
            delivered_at,
            handle: DeliveryHandle {
                reply_subject: reply.to_string(),
                stream_sequence,
            },
        }))
    }

    async fn acknowledge(&self, handle: DeliveryHandle) -> PipelineResult<()> {
        self.settle(&handle, ACK)
            .await
            .map_err(PipelineError::Acknowledge)?;

        // The ack must hit the wire before the handle counts as spent.
        self.client
            .flush()
            .await
            .map_err(|e| PipelineError::Acknowledge(anyhow!(e)))?;

        debug!(stream_sequence = handle.stream_sequence, "Acknowledged message");
        Ok(())
    }

    async fn release(&self, handle: DeliveryHandle) -> PipelineResult<()> {
        self.settle(&handle, NAK).await.map_err(PipelineError::Queue)?;
        debug!(
            stream_sequence = handle.stream_sequence,
            "Released message for redelivery"
        );
        Ok(())
    }

    async fn reject(&self, handle: DeliveryHandle) -> PipelineResult<()> {
        self.settle(&handle, TERM).await.map_err(PipelineError::Queue)?;
        warn!(
            stream_sequence = handle.stream_sequence,
            "Rejected message, no redelivery"
        );
        Ok(())
    }
}

/// Producer-assigned send timestamp from message metadata, when present and
/// well-formed.
fn parse_sent_at(headers: Option<&HeaderMap>) -> Option<DateTime<Utc>> {
    let value = headers?.get(SENT_AT_HEADER)?;
    DateTime::parse_from_rfc3339(value.as_str())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
