//! Bridge counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the request bridge.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Requests handed to the transport.
    pub requests_started: AtomicU64,
    /// Requests whose body completed.
    pub requests_completed: AtomicU64,
    /// Requests that failed with a non-cancellation error.
    pub requests_failed: AtomicU64,
    /// Requests cancelled by the caller or by dropping the body.
    pub requests_cancelled: AtomicU64,
    /// Body bytes pushed into stream buffers.
    pub bytes_received: AtomicU64,
    /// Server certificates rejected by pinning or platform evaluation.
    pub pin_rejections: AtomicU64,
    /// Data events discarded after a request terminated.
    pub dropped_chunks: AtomicU64,
}

impl BridgeMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_started(&self) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bytes(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_pin_rejection(&self) {
        self.pin_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_chunk(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            pin_rejections: self.pin_rejections.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.requests_started.store(0, Ordering::Relaxed);
        self.requests_completed.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.requests_cancelled.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.pin_rejections.store(0, Ordering::Relaxed);
        self.dropped_chunks.store(0, Ordering::Relaxed);
    }
}

/// Counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests handed to the transport.
    pub requests_started: u64,
    /// Requests whose body completed.
    pub requests_completed: u64,
    /// Requests that failed.
    pub requests_failed: u64,
    /// Requests cancelled.
    pub requests_cancelled: u64,
    /// Body bytes received.
    pub bytes_received: u64,
    /// Rejected server certificates.
    pub pin_rejections: u64,
    /// Discarded data events.
    pub dropped_chunks: u64,
}

impl MetricsSnapshot {
    /// Requests started but not yet terminal.
    pub fn in_flight(&self) -> u64 {
        self.requests_started
            .saturating_sub(self.requests_completed + self.requests_failed + self.requests_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BridgeMetrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_completed();
        metrics.record_bytes(1024);
        metrics.record_dropped_chunk();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_started, 2);
        assert_eq!(snapshot.bytes_received, 1024);
        assert_eq!(snapshot.dropped_chunks, 1);
        assert_eq!(snapshot.in_flight(), 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
