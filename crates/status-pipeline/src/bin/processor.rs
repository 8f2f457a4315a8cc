use std::sync::Arc;
use std::time::Duration;

use status_domain::StatusRecordService;
use status_mongo::{MongoStatusRecordRepository, MongoStoreClient};
use status_nats::{NatsClient, NatsStatusQueue};
use status_pipeline::config::ServiceConfig;
use status_pipeline::telemetry::init_tracing;
use status_runner::Runner;
use status_worker::{ProcessorWorker, ProcessorWorkerConfig};
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
        consumer = %config.consumer_name,
        database = %config.mongo_database,
        collection = %config.mongo_collection,
        "Starting status processor"
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

    let store = match MongoStoreClient::connect(
        &config.mongo_uri,
        &config.mongo_database,
        &config.mongo_collection,
    )
    .await
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to connect to MongoDB");
            std::process::exit(1);
        }
    };

    // Fail fast before entering the service loop.
    if !store.ping().await {
        error!("MongoDB is unreachable");
        std::process::exit(1);
    }

    let queue = match NatsStatusQueue::new(
        nats.client().clone(),
        nats.jetstream(),
        &config.status_stream,
        &config.consumer_name,
        &config.status_subject,
        Duration::from_secs(config.poll_max_wait_secs),
    )
    .await
    {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(error = %e, "Failed to create queue consumer");
            std::process::exit(1);
        }
    };

    let repository = Arc::new(MongoStatusRecordRepository::new(store.status_records()));
    let service = Arc::new(StatusRecordService::new(repository));
    let worker = ProcessorWorker::new(
        queue,
        service,
        ProcessorWorkerConfig {
            idle_backoff: Duration::from_secs(config.idle_backoff_secs),
            error_retry: Duration::from_secs(config.error_retry_secs),
        },
    );

    // Teardown order matters: the queue connection goes first so no new
    // deliveries arrive while the store is still usable, then the store.
    let runner = Runner::new()
        .with_named_process("processor", move |ctx| async move { worker.run(ctx).await })
        .with_closer({
            let nats = Arc::clone(&nats);
            move || async move {
                nats.close().await;
                Ok(())
            }
        })
        .with_closer({
            let store = Arc::clone(&store);
            move || async move {
                store.close().await;
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}
