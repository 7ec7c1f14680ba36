// ── Change notification ──

use std::sync::Arc;

use tokio::sync::broadcast;

/// Fire-and-forget signal telling consumers a new snapshot is published.
///
/// Carries only the topic name; receivers re-read the snapshot.
pub trait UpdateSink: Send + Sync {
    fn signal(&self, topic: &str);
}

impl UpdateSink for broadcast::Sender<Arc<str>> {
    fn signal(&self, topic: &str) {
        // No receivers is not an error.
        let _ = self.send(Arc::from(topic));
    }
}

/// Sink for pollers nobody listens to.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl UpdateSink for NullSink {
    fn signal(&self, _topic: &str) {}
}

/// Topic for a configured device name.
pub fn update_topic(name: &str) -> String {
    format!("openmediavault-update-{name}")
}
