//! Application entry point.
//!
//! Wires injected identity and sync services to the connectivity signal:
//! restore the session first, then start the sync coordinator so the startup
//! condition sees the restored session.
//!
//! # Example
//!
//! ```ignore
//! use shelf_client::{App, ConnectivitySignal, CoordinatorConfig, MockIdentity, MockSync};
//!
//! let connectivity = ConnectivitySignal::new(true);
//! let app = App::start(CoordinatorConfig::default(), MockIdentity::new(), MockSync::new(), connectivity).await;
//!
//! app.session().login("reader@example.com", "secret").await?;
//! app.sync_now().await;
//! ```

use std::sync::Arc;
use tokio::sync::watch;

use crate::connectivity::ConnectivitySignal;
use crate::coordinator::{CoordinatorConfig, SyncCoordinator, SyncStatus};
use crate::services::{IdentityService, SyncService};
use crate::session::SessionStore;

/// The running coordinator: session, connectivity, and sync trigger.
pub struct App<I: IdentityService> {
    session: SessionStore<I>,
    connectivity: ConnectivitySignal,
    coordinator: SyncCoordinator,
}

impl<I: IdentityService + 'static> App<I> {
    /// Restore any existing session, then start the sync coordinator.
    pub async fn start<S>(
        config: CoordinatorConfig,
        identity: I,
        sync: S,
        connectivity: ConnectivitySignal,
    ) -> Self
    where
        S: SyncService + 'static,
    {
        let session = SessionStore::with_feed(identity, connectivity.feed());
        let restored = session.refresh_current_user().await;
        tracing::info!(
            "App starting: {}, {}",
            if restored.logged_in() { "logged in" } else { "logged out" },
            if connectivity.is_connected() { "online" } else { "offline" }
        );

        let coordinator =
            SyncCoordinator::spawn(config, Arc::new(sync), &connectivity, session.subscribe());

        Self {
            session,
            connectivity,
            coordinator,
        }
    }

    /// Session state holder.
    pub fn session(&self) -> &SessionStore<I> {
        &self.session
    }

    /// Connectivity signal.
    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.connectivity
    }

    /// Latest sync status.
    pub fn sync_status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    /// Receiver notified on every sync status change.
    pub fn subscribe_sync(&self) -> watch::Receiver<SyncStatus> {
        self.coordinator.subscribe()
    }

    /// Ask for a sync now (only runs when connected and logged in).
    pub async fn sync_now(&self) {
        self.coordinator.sync_now().await;
    }

    /// Stop the coordinator. The session worker stops once the last session
    /// handle is dropped.
    pub async fn shutdown(self) {
        self.coordinator.shutdown().await;
    }
}
