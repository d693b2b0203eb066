//! Broadcast sink trait and implementations.

use std::sync::{Arc, Mutex};

use crate::cache::CacheSnapshot;

/// Receives full cache snapshots from the scheduler.
///
/// # Design Rules
///
/// - `update_data()` must be fast and non-blocking (hand off, don't send inline)
/// - It may be called frequently; diffing against the last delivered state
///   is the implementation's job
/// - Delivery is best-effort and must not affect the refresh cycle
pub trait BroadcastSink: Send + Sync {
    fn update_data(&self, snapshot: CacheSnapshot);
}

/// No-op implementation for tests or headless runs.
#[derive(Clone, Default)]
pub struct NoOpBroadcastSink;

impl BroadcastSink for NoOpBroadcastSink {
    fn update_data(&self, _snapshot: CacheSnapshot) {}
}

/// Mock sink for testing - collects pushed snapshots.
#[derive(Clone, Default)]
pub struct MockBroadcastSink {
    snapshots: Arc<Mutex<Vec<CacheSnapshot>>>,
}

impl MockBroadcastSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected snapshots.
    pub fn snapshots(&self) -> Vec<CacheSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Most recent snapshot, if any.
    pub fn last(&self) -> Option<CacheSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.snapshots.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().unwrap().is_empty()
    }
}

impl BroadcastSink for MockBroadcastSink {
    fn update_data(&self, snapshot: CacheSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_sink_does_not_panic() {
        let sink = NoOpBroadcastSink;
        sink.update_data(CacheSnapshot::default());
    }

    #[test]
    fn test_mock_sink_collects_snapshots() {
        let sink = MockBroadcastSink::new();
        assert!(sink.is_empty());

        let mut snapshot = CacheSnapshot::default();
        sink.update_data(snapshot.clone());
        snapshot.current_price = Some(45000.0);
        sink.update_data(snapshot);

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.last().unwrap().current_price, Some(45000.0));

        sink.clear();
        assert!(sink.is_empty());
    }
}
