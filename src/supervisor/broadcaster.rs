//! Fan-out of script events to subscribers.
//!
//! Each subscriber owns an unbounded channel. Publishing happens under one
//! lock, so every subscriber observes events in the order they were
//! published; closed subscribers are pruned on the next publish.

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::models::event::ScriptEvent;

/// Receiving end handed to a subscriber.
pub type Subscription = mpsc::UnboundedReceiver<ScriptEvent>;

/// Delivers [`ScriptEvent`]s to all current subscribers.
#[derive(Debug, Default)]
pub struct OutputBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ScriptEvent>>>,
}

impl OutputBroadcaster {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events published before this call are
    /// not replayed.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber. Never fails; deliveries to
    /// dropped subscribers are discarded.
    pub async fn publish(&self, event: ScriptEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let pruned = before - subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped closed event subscribers");
        }
    }

    /// Number of subscribers that were live at the last publish.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
