use std::time::Duration;

use anyhow::anyhow;
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use status_domain::{CloseOnce, PipelineError, PipelineResult};
use tracing::{info, warn};

/// Connection to the NATS server plus its JetStream context.
///
/// One client per process; the broadcaster and the processor each own
/// exactly one.
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    closed: CloseOnce,
}

impl NatsClient {
    /// Establish the connection, failing fast when the broker is
    /// unreachable within the timeout.
    pub async fn connect(url: &str, timeout: Duration) -> PipelineResult<Self> {
        info!("Connecting to NATS at {} (timeout={:?})", url, timeout);

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| PipelineError::QueueConnectivity(anyhow!(e)))?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self {
            client,
            jetstream,
            closed: CloseOnce::new(),
        })
    }

    /// Declare the durable stream backing the status queue. Safe to repeat;
    /// an existing stream is left untouched.
    pub async fn ensure_stream(&self, stream_name: &str, subject: &str) -> PipelineResult<()> {
        info!("Ensuring stream '{}' exists", stream_name);

        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => {
                info!("Stream '{}' already exists", stream_name);
            }
            Err(_) => {
                self.jetstream
                    .create_stream(StreamConfig {
                        name: stream_name.to_string(),
                        subjects: vec![subject.to_string()],
                        description: Some("Durable queue for status events".to_string()),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| PipelineError::QueueConnectivity(anyhow!(e)))?;
                info!("Created stream '{}'", stream_name);
            }
        }

        Ok(())
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Release the connection. Idempotent: only the first call flushes,
    /// repeated shutdown signals fall through.
    pub async fn close(&self) {
        if !self.closed.begin() {
            return;
        }

        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Failed to flush NATS connection during close");
        }
        info!("NATS connection closed");
    }
}
