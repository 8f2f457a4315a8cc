use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::Collection;
use status_domain::{
    PipelineError, PipelineResult, StatusRecord, StatusRecordRepository, TimeRange,
};
use tracing::{debug, error, warn};

use crate::models::StatusRecordDocument;

/// MongoDB implementation of StatusRecordRepository.
#[derive(Clone)]
pub struct MongoStatusRecordRepository {
    collection: Collection<StatusRecordDocument>,
}

impl MongoStatusRecordRepository {
    pub fn new(collection: Collection<StatusRecordDocument>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl StatusRecordRepository for MongoStatusRecordRepository {
    async fn insert(&self, record: &StatusRecord) -> PipelineResult<String> {
        let document = StatusRecordDocument::from(record);

        self.collection.insert_one(&document).await.map_err(|e| {
            error!(record_id = %document.id, error = %e, "Failed to insert status record");
            PipelineError::StoreWrite(anyhow!(e))
        })?;

        debug!(record_id = %document.id, "Inserted status record");
        Ok(document.id)
    }

    async fn find_by_id(&self, id: &str) -> PipelineResult<Option<StatusRecord>> {
        let document = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| PipelineError::StoreQuery(anyhow!(e)))?;

        Ok(document.map(StatusRecord::from))
    }

    async fn count_by_status(&self, range: TimeRange) -> PipelineResult<HashMap<String, u64>> {
        let pipeline = vec![
            doc! {
                "$match": {
                    "created_at": {
                        "$gte": bson::DateTime::from_chrono(range.start),
                        "$lte": bson::DateTime::from_chrono(range.end),
                    }
                }
            },
            doc! {
                "$group": {
                    "_id": "$status",
                    "count": { "$sum": 1 }
                }
            },
        ];

        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| PipelineError::StoreQuery(anyhow!(e)))?;

        let mut counts = HashMap::new();
        while let Some(group) = cursor
            .try_next()
            .await
            .map_err(|e| PipelineError::StoreQuery(anyhow!(e)))?
        {
            match parse_group(&group) {
                Some((status, count)) => {
                    counts.insert(status, count);
                }
                None => {
                    warn!(?group, "Skipping malformed aggregation group");
                }
            }
        }

        Ok(counts)
    }
}

fn parse_group(group: &Document) -> Option<(String, u64)> {
    let status = group.get_str("_id").ok()?.to_string();
    let count = match group.get("count")? {
        Bson::Int32(n) => u64::try_from(*n).ok()?,
        Bson::Int64(n) => u64::try_from(*n).ok()?,
        _ => return None,
    };
    Some((status, count))
}
