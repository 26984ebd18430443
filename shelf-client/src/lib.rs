//! # shelf-client
//!
//! Session and sync coordinator runtime for shelf-sync.
//!
//! This is the library the application embeds. It owns the session state,
//! follows network reachability, and decides when to run the remote
//! "sync all data" call.
//!
//! ## Features
//!
//! - **Injected services**: identity, sync, and reachability are traits
//!   ([`IdentityService`], [`SyncService`], [`ConnectivityProvider`])
//! - **Single writer**: the session is changed only by its worker task;
//!   subscribers use `watch` channels
//! - **Ordered changes**: connectivity and session changes share one
//!   [`ChangeFeed`], so the sync trigger sees them in the order they happened
//! - **Last request wins**: stale identity completions are discarded
//! - **One sync at a time**: triggers during a sync fold into one follow-up
//! - **Pure State Machines**: decisions come from shelf-core
//!
//! ## Example
//!
//! ```ignore
//! use shelf_client::{App, ConnectivitySignal, CoordinatorConfig};
//!
//! let connectivity = ConnectivitySignal::new(platform_is_online());
//! connectivity.spawn_monitor(platform_reachability);
//! let app = App::start(CoordinatorConfig::default(), identity, sync, connectivity).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod connectivity;
pub mod coordinator;
pub mod feed;
pub mod services;
pub mod session;

pub use app::App;
pub use connectivity::ConnectivitySignal;
pub use feed::{Change, ChangeFeed};
pub use coordinator::{
    CoordinatorConfig, SyncCoordinator, SyncStatus, DEFAULT_SYNC_TIMEOUT, TIMEOUT_ERROR,
};
pub use services::{
    ConnectivityProvider, IdentityService, MockConnectivity, MockIdentity, MockSync, SyncService,
};
pub use session::{SessionError, SessionStore};
