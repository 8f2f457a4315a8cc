use std::sync::Arc;
use std::time::Duration;

use status_nats::{run_broadcaster, BroadcasterConfig, NatsClient, NatsStatusPublisher};
use status_pipeline::config::ServiceConfig;
use status_pipeline::telemetry::init_tracing;
use status_runner::Runner;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    info!(
        nats_url = %config.nats_url,
        stream = %config.status_stream,
        interval_secs = config.broadcast_interval_secs,
        "Starting status broadcaster"
    );

    let nats = match NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to connect to NATS");
            std::process::exit(1);
        }
    };

    if let Err(e) = nats
        .ensure_stream(&config.status_stream, &config.status_subject)
        .await
    {
        error!(error = %e, "Failed to declare status stream");
        std::process::exit(1);
    }

    let publisher =
        NatsStatusPublisher::new(nats.jetstream().clone(), config.status_subject.clone());
    let broadcaster_config = BroadcasterConfig {
        interval: Duration::from_secs(config.broadcast_interval_secs),
    };

    let runner = Runner::new()
        .with_named_process("broadcaster", move |ctx| async move {
            run_broadcaster(ctx, broadcaster_config, publisher).await
        })
        .with_closer({
            let nats = Arc::clone(&nats);
            move || async move {
                nats.close().await;
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}
