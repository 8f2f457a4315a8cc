use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Configuration shared by both pipeline binaries, loaded from `STATUS_`
/// prefixed environment variables. The broker and store are injected
/// dependencies; everything here is connection wiring plus loop timing.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream name backing the status queue
    #[serde(default = "default_status_stream")]
    pub status_stream: String,

    /// Subject status events are published to
    #[serde(default = "default_status_subject")]
    pub status_subject: String,

    /// Durable consumer name for the processor
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Max wait for a single poll before it reports an empty queue, seconds
    #[serde(default = "default_poll_max_wait_secs")]
    pub poll_max_wait_secs: u64,

    /// Startup timeout for connection establishment, seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Loop timing
    /// Sleep between polls when the queue is empty, seconds
    #[serde(default = "default_idle_backoff_secs")]
    pub idle_backoff_secs: u64,

    /// Sleep after a failed processing cycle, seconds
    #[serde(default = "default_error_retry_secs")]
    pub error_retry_secs: u64,

    /// Interval between broadcast publishes, seconds
    #[serde(default = "default_broadcast_interval_secs")]
    pub broadcast_interval_secs: u64,

    // MongoDB configuration
    /// MongoDB connection URI
    #[serde(default = "default_mongo_uri")]
    pub mongo_uri: String,

    /// MongoDB database name
    #[serde(default = "default_mongo_database")]
    pub mongo_database: String,

    /// MongoDB collection holding status records
    #[serde(default = "default_mongo_collection")]
    pub mongo_collection: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_status_stream() -> String {
    "status_events".to_string()
}

fn default_status_subject() -> String {
    "status.events".to_string()
}

fn default_consumer_name() -> String {
    "status-processor".to_string()
}

fn default_poll_max_wait_secs() -> u64 {
    1
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_idle_backoff_secs() -> u64 {
    10
}

fn default_error_retry_secs() -> u64 {
    1
}

fn default_broadcast_interval_secs() -> u64 {
    1
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "status_pipeline".to_string()
}

fn default_mongo_collection() -> String {
    "status_records".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("STATUS"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var tests share process state; run them serially.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::remove_var("STATUS_IDLE_BACKOFF_SECS");
        std::env::remove_var("STATUS_NATS_URL");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.status_stream, "status_events");
        assert_eq!(config.idle_backoff_secs, 10);
        assert_eq!(config.broadcast_interval_secs, 1);
        assert_eq!(config.mongo_collection, "status_records");
    }

    #[test]
    fn test_environment_overrides() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("STATUS_IDLE_BACKOFF_SECS", "30");
        std::env::set_var("STATUS_NATS_URL", "nats://broker:4222");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.idle_backoff_secs, 30);
        assert_eq!(config.nats_url, "nats://broker:4222");

        std::env::remove_var("STATUS_IDLE_BACKOFF_SECS");
        std::env::remove_var("STATUS_NATS_URL");
    }
}
