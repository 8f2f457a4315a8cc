use anyhow::anyhow;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use chrono::Utc;
use status_domain::{PipelineError, PipelineResult, StatusEvent, StatusEventPublisher};
use tracing::{debug, info};

/// Metadata header carrying the producer-assigned send timestamp, RFC 3339.
pub const SENT_AT_HEADER: &str = "sent-at";

/// JetStream publisher for status events.
///
/// Every publish awaits the JetStream acknowledgment, so a returned `Ok`
/// means the broker has durably accepted the message.
pub struct NatsStatusPublisher {
    jetstream: jetstream::Context,
    subject: String,
}

impl NatsStatusPublisher {
    pub fn new(jetstream: jetstream::Context, subject: String) -> Self {
        info!("Created status publisher for subject '{}'", subject);
        Self { jetstream, subject }
    }
}

#[async_trait]
impl StatusEventPublisher for NatsStatusPublisher {
    async fn publish(&self, event: &StatusEvent) -> PipelineResult<()> {
        let payload = event.to_bytes()?;

        let sent_at = Utc::now().to_rfc3339();
        let mut headers = HeaderMap::new();
        headers.insert(SENT_AT_HEADER, sent_at.as_str());

        debug!(
            subject = %self.subject,
            status = event.status,
            size_bytes = payload.len(),
            "Publishing status event"
        );

        let ack = self
            .jetstream
            .publish_with_headers(self.subject.clone(), headers, payload.into())
            .await
            .map_err(|e| PipelineError::Queue(anyhow!(e)))?;

        ack.await.map_err(|e| PipelineError::Queue(anyhow!(e)))?;

        Ok(())
    }
}
