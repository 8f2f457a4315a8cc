mod client;
mod models;
mod record_repository;

pub use client::MongoStoreClient;
pub use models::StatusRecordDocument;
pub use record_repository::MongoStatusRecordRepository;
