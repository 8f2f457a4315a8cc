use anyhow::anyhow;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use status_domain::{CloseOnce, PipelineError, PipelineResult};
use tracing::{debug, error, info};

use crate::models::StatusRecordDocument;

/// Connection to the MongoDB deployment holding the status collection.
///
/// Construction only validates the URI; `ping` is the startup liveness
/// probe that fails the process fast when the store is unreachable.
pub struct MongoStoreClient {
    client: Client,
    database: String,
    collection: String,
    closed: CloseOnce,
}

impl MongoStoreClient {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> PipelineResult<Self> {
        info!(database, collection, "Connecting to MongoDB");

        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| PipelineError::StoreConnectivity(anyhow!(e)))?;

        Ok(Self {
            client,
            database: database.to_string(),
            collection: collection.to_string(),
            closed: CloseOnce::new(),
        })
    }

    /// Liveness probe. Used at startup only.
    pub async fn ping(&self) -> bool {
        match self
            .client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
        {
            Ok(_) => {
                debug!("MongoDB connection verified");
                true
            }
            Err(e) => {
                error!(error = %e, "MongoDB ping failed");
                false
            }
        }
    }

    pub fn status_records(&self) -> Collection<StatusRecordDocument> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }

    /// Release the connection. Idempotent under repeated shutdown signals.
    pub async fn close(&self) {
        if !self.closed.begin() {
            return;
        }

        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}
