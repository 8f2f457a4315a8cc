use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("queue unreachable: {0}")]
    QueueConnectivity(#[source] anyhow::Error),

    #[error("store unreachable: {0}")]
    StoreConnectivity(#[source] anyhow::Error),

    #[error("invalid status payload: {0}")]
    MessageDecode(#[from] serde_json::Error),

    #[error("store write failed: {0}")]
    StoreWrite(#[source] anyhow::Error),

    #[error("store query failed: {0}")]
    StoreQuery(#[source] anyhow::Error),

    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] anyhow::Error),

    #[error("queue operation failed: {0}")]
    Queue(#[source] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
