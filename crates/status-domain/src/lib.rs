mod error;
mod event;
mod record;
mod repository;
mod service;
mod types;

pub use error::{PipelineError, PipelineResult};
pub use event::{StatusEvent, MAX_STATUS};
pub use record::StatusRecord;
pub use repository::{StatusEventPublisher, StatusQueue, StatusRecordRepository};
pub use service::StatusRecordService;
pub use types::{CloseOnce, DeliveryHandle, StatusDelivery, TimeRange};
