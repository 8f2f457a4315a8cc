use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use status_domain::{PipelineError, PipelineResult, StatusQueue, StatusRecordService};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Queue was empty; the caller backs off before polling again.
    Empty,
    /// One message was processed and settled.
    Processed,
    /// One malformed message was dropped without a store write.
    Skipped,
}

pub struct ProcessorWorkerConfig {
    /// Sleep after an empty poll. Fixed interval, no jitter.
    pub idle_backoff: Duration,
    /// Sleep after a failed cycle before polling again.
    pub error_retry: Duration,
}

impl Default for ProcessorWorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_secs(10),
            error_retry: Duration::from_secs(1),
        }
    }
}

/// The consume-process-acknowledge loop.
///
/// Each cycle pulls at most one message, hands it to the record service,
/// and settles the delivery strictly after the outcome is known:
/// acknowledge only once the store write succeeded, release on a failed
/// write so the broker redelivers, reject on a payload that will never
/// decode. A crash anywhere before the acknowledge leaves the message
/// redeliverable.
pub struct ProcessorWorker {
    queue: Arc<dyn StatusQueue>,
    service: Arc<StatusRecordService>,
    config: ProcessorWorkerConfig,
}

impl ProcessorWorker {
    pub fn new(
        queue: Arc<dyn StatusQueue>,
        service: Arc<StatusRecordService>,
        config: ProcessorWorkerConfig,
    ) -> Self {
        Self {
            queue,
            service,
            config,
        }
    }

    /// One fetch-process-settle cycle.
    pub async fn run_once(&self) -> PipelineResult<CycleOutcome> {
        let Some(delivery) = self.queue.poll().await? else {
            return Ok(CycleOutcome::Empty);
        };

        let handle = delivery.handle.clone();

        match self.service.process_delivery(&delivery).await {
            Ok(record) => {
                // The write is durable; an ack failure from here on can only
                // cost us a duplicate record on redelivery, never a loss.
                if let Err(e) = self.queue.acknowledge(handle).await {
                    warn!(
                        record_id = %record.id,
                        stream_sequence = record.stream_sequence,
                        error = %e,
                        "Acknowledge failed after a successful write, redelivery may duplicate this record"
                    );
                }
                Ok(CycleOutcome::Processed)
            }
            Err(PipelineError::MessageDecode(e)) => {
                error!(
                    stream_sequence = handle.stream_sequence,
                    error = %e,
                    "Dropping malformed status payload"
                );
                if let Err(e) = self.queue.reject(handle).await {
                    warn!(error = %e, "Failed to reject malformed message");
                }
                Ok(CycleOutcome::Skipped)
            }
            Err(e) => {
                // Store write failed: the message must stay redeliverable.
                if let Err(release_err) = self.queue.release(handle).await {
                    warn!(error = %release_err, "Failed to release message after a failed cycle");
                }
                Err(e)
            }
        }
    }

    /// Service loop: drain bursts back to back, back off on an empty queue,
    /// keep going through recoverable cycle errors, stop on cancellation.
    ///
    /// Cancellation is checked between cycles only, so an in-flight
    /// insert-acknowledge pair always runs to completion before shutdown.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Status processor started");

        while !ctx.is_cancelled() {
            match self.run_once().await {
                Ok(CycleOutcome::Empty) => {
                    debug!(
                        backoff_secs = self.config.idle_backoff.as_secs(),
                        "No messages available, backing off"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => {}
                        _ = tokio::time::sleep(self.config.idle_backoff) => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Processing cycle failed");
                    tokio::select! {
                        _ = ctx.cancelled() => {}
                        _ = tokio::time::sleep(self.config.error_retry) => {}
                    }
                }
            }
        }

        info!("Status processor stopped gracefully");
        Ok(())
    }
}
