//! # shelf-core
//!
//! Pure logic for shelf-sync (no I/O, instant tests).
//!
//! This crate implements the session model and the sync-trigger state
//! machine without any network access or async runtime.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`Session::on_event`] folds an identity-service outcome into the session
//! - [`OpTracker`] hands out in-flight tokens so stale completions are dropped
//! - [`SyncTrigger::on_event`] turns connectivity/session observations into
//!   "start a sync" actions
//!
//! The actual I/O (identity calls, sync calls, channels) is performed by
//! `shelf-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ops;
pub mod session;
pub mod trigger;

pub use ops::{OpKind, OpToken, OpTracker};
pub use session::{Session, SessionAction, SessionEvent, SessionReport};
pub use trigger::{
    Action, SkipCause, SyncEvent, SyncReason, SyncTrigger, TriggerEvent, TriggerPolicy,
    TriggerState,
};
