//! # shelf-types
//!
//! Data types for the shelf-sync coordinator.
//!
//! This crate provides the foundational types used across all shelf-sync crates:
//! - [`UserId`], [`User`], [`UserProfile`] - Identity of the signed-in reader
//! - [`SyncResult`] - Outcome of one "sync all data" call
//! - [`ServiceError`] - Errors reported by the remote identity/sync services

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod result;
mod user;

pub use error::ServiceError;
pub use ids::UserId;
pub use result::SyncResult;
pub use user::{User, UserProfile};

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
