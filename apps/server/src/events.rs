use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use btcpulse_core::cache::CacheSnapshot;
use btcpulse_core::events::BroadcastSink;

/// Fans out serialized snapshots to WebSocket and SSE clients.
///
/// Remembers the last message so new clients get it right away, and only
/// publishes when the serialized snapshot differs from the previous one.
#[derive(Clone)]
pub struct SnapshotBroadcaster {
    sender: broadcast::Sender<Arc<str>>,
    latest: Arc<Mutex<Option<Arc<str>>>>,
}

impl SnapshotBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    fn lock_latest(&self) -> MutexGuard<'_, Option<Arc<str>>> {
        self.latest.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Broadcaster lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.sender.subscribe()
    }

    /// Last published snapshot as JSON.
    pub fn latest(&self) -> Option<Arc<str>> {
        self.lock_latest().clone()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Stores and publishes `message` unless it equals the last one.
    /// Returns whether it was published.
    pub fn publish_if_changed(&self, message: String) -> bool {
        let message: Arc<str> = Arc::from(message);
        {
            let mut latest = self.lock_latest();
            if latest.as_deref() == Some(&*message) {
                tracing::debug!("Snapshot unchanged, not broadcasting");
                return false;
            }
            *latest = Some(message.clone());
        }
        // Lagging listeners are ignored to avoid blocking producers.
        let _ = self.sender.send(message);
        true
    }

    /// Sends the last snapshot again, changed or not.
    pub fn rebroadcast(&self) -> bool {
        match self.latest() {
            Some(message) => {
                let _ = self.sender.send(message);
                true
            }
            None => false,
        }
    }

    /// Re-broadcasts the cached snapshot every `period` until aborted.
    pub fn spawn_rebroadcast(&self, period: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if period.is_zero() {
                return;
            }
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if this.client_count() > 0 && this.rebroadcast() {
                    tracing::debug!("Re-broadcast snapshot to {} clients", this.client_count());
                }
            }
        })
    }
}

impl BroadcastSink for SnapshotBroadcaster {
    fn update_data(&self, snapshot: CacheSnapshot) {
        match serde_json::to_string(&snapshot) {
            Ok(message) => {
                if self.publish_if_changed(message) {
                    tracing::debug!("Broadcast snapshot to {} clients", self.client_count());
                }
            }
            Err(e) => tracing::error!("Failed to serialize snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identical_snapshots_are_published_once() {
        let broadcaster = SnapshotBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.update_data(CacheSnapshot::default());
        broadcaster.update_data(CacheSnapshot::default());

        let first = rx.recv().await.unwrap();
        assert!(first.contains("\"currentTimeframe\":\"5M\""));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_changed_snapshot_is_published_and_remembered() {
        let broadcaster = SnapshotBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.update_data(CacheSnapshot::default());
        let mut snapshot = CacheSnapshot::default();
        snapshot.current_price = Some(45000.0);
        broadcaster.update_data(snapshot);

        rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.contains("45000"));
        assert_eq!(broadcaster.latest().as_deref(), Some(&*second));
    }

    #[tokio::test]
    async fn test_rebroadcast_resends_latest() {
        let broadcaster = SnapshotBroadcaster::new(8);
        assert!(!broadcaster.rebroadcast());

        broadcaster.publish_if_changed("{\"a\":1}".to_string());
        let mut rx = broadcaster.subscribe();
        assert!(broadcaster.rebroadcast());
        assert_eq!(&*rx.recv().await.unwrap(), "{\"a\":1}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_rebroadcast() {
        let broadcaster = SnapshotBroadcaster::new(8);
        broadcaster.publish_if_changed("{}".to_string());
        let mut rx = broadcaster.subscribe();

        let handle = broadcaster.spawn_rebroadcast(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(&*rx.recv().await.unwrap(), "{}");
        handle.abort();
    }
}
