//! Per-sink delivery counters
//!
//! Shared between a `SinkHandle` (queue side) and its worker (write side).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What happened to one envelope offered to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Written,
    Failed,
    /// Queue was full when the envelope arrived
    Dropped,
}

#[derive(Debug, Default)]
pub struct SinkMetrics {
    backlog: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, delivery: Delivery) {
        let counter = match delivery {
            Delivery::Written => &self.written,
            Delivery::Failed => &self.failed,
            Delivery::Dropped => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Envelopes waiting in the sink queue
    pub fn set_backlog(&self, len: usize) {
        self.backlog.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.backlog.load(Ordering::Relaxed),
            write_count: self.written.load(Ordering::Relaxed),
            failure_count: self.failed.load(Ordering::Relaxed),
            dropped_count: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a sink's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Envelopes the sink was offered, whatever the outcome
    pub fn offered(&self) -> u64 {
        self.write_count + self.failure_count + self.dropped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_routes_to_counter() {
        let metrics = SinkMetrics::new();
        metrics.record(Delivery::Written);
        metrics.record(Delivery::Written);
        metrics.record(Delivery::Dropped);
        metrics.set_backlog(3);

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                queue_len: 3,
                write_count: 2,
                failure_count: 0,
                dropped_count: 1,
            }
        );
        assert_eq!(snapshot.offered(), 3);
    }
}
