mod broadcaster;
mod client;
mod publisher;
mod queue;

pub use broadcaster::{run_broadcaster, BroadcasterConfig};
pub use client::NatsClient;
pub use publisher::{NatsStatusPublisher, SENT_AT_HEADER};
pub use queue::NatsStatusQueue;
