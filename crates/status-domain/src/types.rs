use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

/// Broker-side token correlating one fetched message to its acknowledgment.
/// Owned by the processor for exactly one cycle; spent by acknowledge,
/// release, or reject.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryHandle {
    pub reply_subject: String,
    pub stream_sequence: u64,
}

/// One message fetched from the queue: the raw body, the delivery timestamp
/// that becomes `created_at`, and the handle for the acknowledgment.
#[derive(Debug, Clone)]
pub struct StatusDelivery {
    pub payload: Vec<u8>,
    pub delivered_at: DateTime<Utc>,
    pub handle: DeliveryHandle,
}

/// Inclusive time window for the per-status count aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Latch guarding a close path so repeated shutdown signals cannot
/// double-close a connection. The first `begin` wins; every later call is a
/// no-op.
#[derive(Debug, Default)]
pub struct CloseOnce(AtomicBool);

impl CloseOnce {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns true exactly once, for the caller that gets to run the close.
    pub fn begin(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
