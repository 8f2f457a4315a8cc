use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Highest status value the broadcaster emits. The decoder deliberately does
/// not enforce this range: payload validation is structural only.
pub const MAX_STATUS: i64 = 6;

/// Wire payload published by the broadcaster.
///
/// `status` is the only required field; anything else in the JSON body is
/// carried through untouched so producers can attach extra context without
/// a schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StatusEvent {
    pub fn new(status: i64) -> Self {
        Self {
            status,
            extra: serde_json::Map::new(),
        }
    }

    /// Decode a UTF-8 JSON message body.
    pub fn from_slice(payload: &[u8]) -> PipelineResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_bytes(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
