use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use status_domain::{StatusEvent, StatusEventPublisher, MAX_STATUS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Configuration for the broadcaster loop.
pub struct BroadcasterConfig {
    /// Interval between status publishes. The loop re-arms after each
    /// publish, so publish latency drifts the effective period.
    pub interval: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Publish a uniformly random status in `[0, MAX_STATUS]` every interval
/// until cancelled.
///
/// Publish failures are logged and the loop keeps going; the broker being
/// briefly unavailable costs individual events, not the process.
pub async fn run_broadcaster<P>(
    ctx: CancellationToken,
    config: BroadcasterConfig,
    publisher: P,
) -> Result<()>
where
    P: StatusEventPublisher,
{
    info!("Status broadcaster started");

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("Received shutdown signal, stopping broadcaster");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {
                let status: i64 = rand::thread_rng().gen_range(0..=MAX_STATUS);
                let event = StatusEvent::new(status);

                match publisher.publish(&event).await {
                    Ok(()) => {
                        debug!(status, "Published status event");
                    }
                    Err(e) => {
                        error!(status, error = %e, "Failed to publish status event");
                    }
                }
            }
        }
    }

    info!("Status broadcaster stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use status_domain::{PipelineError, PipelineResult};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Publisher double that records what was published and when, and
    /// cancels the loop once it has seen enough events.
    struct RecordingPublisher {
        published: Arc<Mutex<Vec<(i64, Instant)>>>,
        stop_after: usize,
        ctx: CancellationToken,
        fail: bool,
    }

    #[async_trait]
    impl StatusEventPublisher for RecordingPublisher {
        async fn publish(&self, event: &StatusEvent) -> PipelineResult<()> {
            let mut published = self.published.lock().unwrap();
            published.push((event.status, Instant::now()));
            if published.len() >= self.stop_after {
                self.ctx.cancel();
            }
            if self.fail {
                return Err(PipelineError::Queue(anyhow::anyhow!("broker away")));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_one_event_per_tick_within_range() {
        let ctx = CancellationToken::new();
        let published = Arc::new(Mutex::new(Vec::new()));
        let publisher = RecordingPublisher {
            published: Arc::clone(&published),
            stop_after: 5,
            ctx: ctx.clone(),
            fail: false,
        };

        run_broadcaster(ctx, BroadcasterConfig::default(), publisher)
            .await
            .unwrap();

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 5);
        for (status, _) in published.iter() {
            assert!((0..=MAX_STATUS).contains(status));
        }
        for pair in published.windows(2) {
            assert_eq!(pair[1].1 - pair[0].1, Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failures_do_not_stop_the_loop() {
        let ctx = CancellationToken::new();
        let published = Arc::new(Mutex::new(Vec::new()));
        let publisher = RecordingPublisher {
            published: Arc::clone(&published),
            stop_after: 3,
            ctx: ctx.clone(),
            fail: true,
        };

        run_broadcaster(ctx, BroadcasterConfig::default(), publisher)
            .await
            .unwrap();

        assert_eq!(published.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop_before_the_next_tick() {
        let ctx = CancellationToken::new();
        ctx.cancel();

        let published = Arc::new(Mutex::new(Vec::new()));
        let publisher = RecordingPublisher {
            published: Arc::clone(&published),
            stop_after: usize::MAX,
            ctx: ctx.clone(),
            fail: false,
        };

        run_broadcaster(ctx, BroadcasterConfig::default(), publisher)
            .await
            .unwrap();

        assert!(published.lock().unwrap().is_empty());
    }
}
