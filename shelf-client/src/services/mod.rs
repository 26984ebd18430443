//! Remote collaborators of the coordinator.
//!
//! The coordinator never talks to a backend directly. It is handed
//! implementations of these traits at construction time, so production code
//! can plug in a real backend while tests use the mocks in this module.
//!
//! # Design
//!
//! - [`IdentityService`] answers "who is signed in" and performs login/logout
//! - [`SyncService`] reconciles local and remote reading data in one call
//! - [`ConnectivityProvider`] reports platform reachability changes
//!
//! Every call completes once (success or failure); nothing streams except
//! the connectivity provider, which yields one transition per call.

mod mock;

pub use mock::{MockConnectivity, MockIdentity, MockSync};

use async_trait::async_trait;
use shelf_types::{ServiceError, SyncResult, User, UserId, UserProfile};

/// Remote identity service (accounts and sessions).
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Id of the account with a persisted session, if any.
    async fn current_user_id(&self) -> Option<UserId>;

    /// Fetch profile fields for an account.
    async fn fetch_user_profile(&self, id: &UserId) -> Result<UserProfile, ServiceError>;

    /// Sign in with email and password.
    async fn login(&self, email: &str, password: &str) -> Result<User, ServiceError>;

    /// Sign out the current account.
    async fn logout(&self) -> Result<(), ServiceError>;
}

/// Remote "sync all data" operation.
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Reconcile all local and remote book/progress data.
    ///
    /// A returned `Err` means the call itself failed; partial failures are
    /// reported through [`SyncResult::errors`].
    async fn sync_all(&self) -> Result<SyncResult, ServiceError>;
}

/// Source of platform reachability transitions.
#[async_trait]
pub trait ConnectivityProvider: Send + Sync {
    /// Wait for the next reachability value.
    ///
    /// An error means the monitor is gone; no further values will arrive.
    async fn next_change(&self) -> Result<bool, ServiceError>;
}
