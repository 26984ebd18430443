//! Connectivity signal.
//!
//! Holds the current reachability and broadcasts every transition. The value
//! lives in a `watch` channel; transitions go out on a `broadcast` channel so
//! a subscriber sees every edge even if it falls behind the current value.
//! Each transition is also published on the signal's [`ChangeFeed`].

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::feed::{Change, ChangeFeed};
use crate::services::ConnectivityProvider;

/// Capacity of the transition channel before subscribers start lagging.
const TRANSITION_CAPACITY: usize = 64;

/// Observable reachability state.
///
/// Cloning shares the same signal.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug)]
struct SignalInner {
    state: watch::Sender<bool>,
    transitions: broadcast::Sender<bool>,
    feed: ChangeFeed,
}

impl ConnectivitySignal {
    /// Create a signal with the given initial reachability.
    pub fn new(initial: bool) -> Self {
        Self::with_feed(initial, ChangeFeed::new())
    }

    /// Create a signal that publishes its transitions into `feed`.
    pub fn with_feed(initial: bool, feed: ChangeFeed) -> Self {
        let (state, _) = watch::channel(initial);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            inner: Arc::new(SignalInner {
                state,
                transitions,
                feed,
            }),
        }
    }

    /// Current reachability.
    pub fn is_connected(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Record a reachability value. Returns `true` if it was a transition.
    pub fn set(&self, connected: bool) -> bool {
        let SignalInner {
            state,
            transitions,
            feed,
        } = &*self.inner;
        let changed = state.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            // Sent under the watch lock so transition order matches state order.
            let _ = transitions.send(connected);
            feed.publish(Change::Connectivity { connected });
            true
        });

        if changed {
            tracing::info!(
                "Connectivity: {}",
                if connected { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Treat the network as unreachable (monitor failure).
    pub fn mark_unavailable(&self) {
        self.set(false);
    }

    /// Subscribe to transitions made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.inner.transitions.subscribe()
    }

    /// The feed this signal publishes into.
    pub fn feed(&self) -> ChangeFeed {
        self.inner.feed.clone()
    }

    /// Receiver for the current value.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Drive this signal from a platform reachability provider.
    ///
    /// A provider error ends the monitor and leaves the signal disconnected.
    pub fn spawn_monitor<P>(&self, provider: P) -> JoinHandle<()>
    where
        P: ConnectivityProvider + 'static,
    {
        let signal = self.clone();
        tokio::spawn(async move {
            loop {
                match provider.next_change().await {
                    Ok(connected) => {
                        signal.set(connected);
                    }
                    Err(e) => {
                        tracing::warn!("Connectivity monitor stopped, assuming offline: {}", e);
                        signal.mark_unavailable();
                        break;
                    }
                }
            }
        })
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockConnectivity;
    use shelf_types::ServiceError;

    #[test]
    fn starts_with_initial_value() {
        assert!(ConnectivitySignal::new(true).is_connected());
        assert!(!ConnectivitySignal::default().is_connected());
    }

    #[tokio::test]
    async fn only_real_transitions_are_broadcast() {
        let signal = ConnectivitySignal::new(false);
        let mut rx = signal.subscribe();

        assert!(!signal.set(false));
        assert!(signal.set(true));
        assert!(!signal.set(true));
        assert!(signal.set(false));

        assert!(rx.recv().await.unwrap());
        assert!(!rx.recv().await.unwrap());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn transitions_reach_the_shared_feed() {
        let feed = ChangeFeed::new();
        let mut changes = feed.subscribe();
        let signal = ConnectivitySignal::with_feed(false, feed);

        signal.set(true);
        signal.set(true);
        signal.set(false);

        assert_eq!(
            changes.recv().await.unwrap(),
            Change::Connectivity { connected: true }
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            Change::Connectivity { connected: false }
        );
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn watch_sees_latest_value() {
        let signal = ConnectivitySignal::new(false);
        let mut rx = signal.watch();
        signal.set(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let signal = ConnectivitySignal::new(false);
        let other = signal.clone();
        other.set(true);
        assert!(signal.is_connected());
    }

    #[tokio::test]
    async fn monitor_follows_provider() {
        let signal = ConnectivitySignal::new(false);
        let mut rx = signal.subscribe();
        let provider = MockConnectivity::new();
        let _monitor = signal.spawn_monitor(provider.clone());

        provider.report(true);
        assert!(rx.recv().await.unwrap());
        provider.report(false);
        assert!(!rx.recv().await.unwrap());
    }

    #[tokio::test]
    async fn monitor_failure_degrades_to_offline() {
        let signal = ConnectivitySignal::new(true);
        let provider = MockConnectivity::new();
        let monitor = signal.spawn_monitor(provider.clone());

        provider.fail(ServiceError::Unavailable("reachability API gone".into()));
        monitor.await.unwrap();

        assert!(!signal.is_connected());
    }
}
