// ── Snapshot store ──
//
// Working copy behind a mutex (the exclusive-access token shared by both
// cycles) plus a `watch` channel carrying the last published copy.
// Readers only ever see published snapshots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, watch};

use crate::model::Snapshot;

pub(crate) struct SnapshotStore {
    working: Mutex<Snapshot>,
    published: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub(crate) fn new() -> Self {
        let (published, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            working: Mutex::new(Snapshot::default()),
            published,
        }
    }

    /// Take the exclusive-access token, waiting at most `wait`.
    pub(crate) async fn acquire(&self, wait: Duration) -> Option<MutexGuard<'_, Snapshot>> {
        tokio::time::timeout(wait, self.working.lock()).await.ok()
    }

    /// Replace the published snapshot and wake subscribers.
    pub(crate) fn publish(&self, snapshot: Snapshot) {
        self.published.send_replace(Arc::new(snapshot));
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.published.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.published.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    #[tokio::test(start_paused = true)]
    async fn acquire_times_out_while_held() {
        let store = SnapshotStore::new();
        let guard = store.acquire(Duration::from_secs(1)).await;
        assert!(guard.is_some());

        assert!(store.acquire(Duration::from_secs(10)).await.is_none());

        drop(guard);
        assert!(store.acquire(Duration::from_secs(10)).await.is_some());
    }

    #[tokio::test]
    async fn publish_replaces_current_and_notifies() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();
        assert!(store.current().is_empty());

        let mut snapshot = Snapshot::default();
        snapshot.hwinfo.insert("hostname".into(), FieldValue::from("nas"));
        store.publish(snapshot);

        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(
            rx.borrow_and_update().hwinfo.get("hostname"),
            Some(&FieldValue::from("nas"))
        );
        assert!(!store.current().is_empty());
    }
}
