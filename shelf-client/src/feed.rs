//! Ordered change feed.
//!
//! Connectivity and session changes are published into one `broadcast`
//! channel, so a subscriber sees them in the order they happened. The sync
//! coordinator reads this feed instead of polling two separate channels.

use tokio::sync::broadcast;

use shelf_core::TriggerEvent;

/// Capacity of the feed before subscribers start lagging.
const FEED_CAPACITY: usize = 64;

/// One observed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Reachability changed.
    Connectivity {
        /// New reachability.
        connected: bool,
    },
    /// The session went logged-in or logged-out.
    Session {
        /// New session state.
        logged_in: bool,
    },
}

impl From<Change> for TriggerEvent {
    fn from(change: Change) -> Self {
        match change {
            Change::Connectivity { connected } => TriggerEvent::ConnectivityChanged { connected },
            Change::Session { logged_in } => TriggerEvent::SessionChanged { logged_in },
        }
    }
}

/// Shared, ordered stream of [`Change`]s.
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a change to current subscribers.
    pub fn publish(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    /// Subscribe to changes published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
