//! Sync trigger state machine for shelf-sync.
//!
//! Observes connectivity and session state and decides when the remote
//! "sync all data" call runs. Like the session model this is pure: it takes
//! events as input and produces a new state plus a list of actions.
//!
//! A sync starts when:
//! - the process starts while connected and logged in, or
//! - connectivity goes false -> true while logged in, or
//! - (opt-in via [`TriggerPolicy::sync_on_login`]) the session goes
//!   logged-out -> logged-in while connected, or
//! - the application asks for one explicitly and both conditions hold.
//!
//! At most one sync is in flight. Trigger conditions that arrive while a sync
//! is running collapse into a single follow-up that starts when the running
//! sync finishes, provided the device is still connected and logged in.

use serde::Serialize;
use shelf_types::SyncResult;
use std::fmt;

/// Policy knobs for the trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerPolicy {
    /// Also sync when a login completes while already connected.
    pub sync_on_login: bool,
}

/// Whether a sync is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TriggerState {
    /// No sync in flight.
    Idle,
    /// A sync is in flight.
    Syncing {
        /// Why it was started.
        reason: SyncReason,
    },
}

/// Why a sync was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// Process start with connectivity and session already in place.
    Startup,
    /// Connectivity came back while logged in.
    Reconnected,
    /// Login completed while connected.
    Login,
    /// Explicit request from the application.
    Manual,
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Reconnected => "reconnected",
            Self::Login => "login",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Why a requested sync did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    /// The startup condition has not been evaluated yet.
    NotStarted,
    /// No network path.
    Offline,
    /// Nobody is signed in.
    LoggedOut,
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotStarted => "coordinator not started",
            Self::Offline => "offline",
            Self::LoggedOut => "not logged in",
        };
        f.write_str(text)
    }
}

/// Events observed by the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Process start, after the initial session refresh.
    Started {
        /// Connectivity at start.
        connected: bool,
        /// Session state at start.
        logged_in: bool,
    },
    /// Reachability changed.
    ConnectivityChanged {
        /// New reachability.
        connected: bool,
    },
    /// Session changed.
    SessionChanged {
        /// Whether a user is now signed in.
        logged_in: bool,
    },
    /// Application asked for a sync.
    SyncRequested,
    /// The in-flight sync finished (successfully or not).
    SyncFinished {
        /// Outcome of the sync.
        result: SyncResult,
    },
}

/// Actions to be executed by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Invoke the remote sync service.
    StartSync {
        /// Why the sync runs.
        reason: SyncReason,
    },
    /// Emit an event to the log sink / status subscribers.
    EmitEvent(SyncEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync started.
    Started {
        /// Why it started.
        reason: SyncReason,
    },
    /// A sync finished.
    Completed {
        /// Why it had started.
        reason: SyncReason,
        /// Its outcome.
        result: SyncResult,
    },
    /// A trigger arrived while syncing and was folded into one follow-up.
    Coalesced {
        /// Reason of the folded trigger.
        reason: SyncReason,
    },
    /// A requested sync did not start.
    Skipped {
        /// Reason of the request.
        reason: SyncReason,
        /// Why it was skipped.
        cause: SkipCause,
    },
}

/// The sync trigger - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTrigger {
    policy: TriggerPolicy,
    state: TriggerState,
    started: bool,
    connected: bool,
    logged_in: bool,
    pending: Option<SyncReason>,
}

impl SyncTrigger {
    /// Create a trigger that has not seen the startup event yet.
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            state: TriggerState::Idle,
            started: false,
            connected: false,
            logged_in: false,
            pending: None,
        }
    }

    /// Process an event and return the new trigger plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions.
    pub fn on_event(mut self, event: TriggerEvent) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();

        match event {
            TriggerEvent::Started {
                connected,
                logged_in,
            } => {
                if !self.started {
                    self.started = true;
                    self.connected = connected;
                    self.logged_in = logged_in;
                    if connected && logged_in {
                        self.request(SyncReason::Startup, &mut actions);
                    }
                }
            }
            TriggerEvent::ConnectivityChanged { connected } => {
                let rising = !self.connected && connected;
                self.connected = connected;
                if self.started && rising && self.logged_in {
                    self.request(SyncReason::Reconnected, &mut actions);
                }
            }
            TriggerEvent::SessionChanged { logged_in } => {
                let rising = !self.logged_in && logged_in;
                self.logged_in = logged_in;
                if !logged_in {
                    self.pending = None;
                }
                if self.started && rising && self.connected && self.policy.sync_on_login {
                    self.request(SyncReason::Login, &mut actions);
                }
            }
            TriggerEvent::SyncRequested => {
                let reason = SyncReason::Manual;
                match self.blocker() {
                    Some(cause) => {
                        actions.push(Action::EmitEvent(SyncEvent::Skipped { reason, cause }))
                    }
                    None => self.request(reason, &mut actions),
                }
            }
            TriggerEvent::SyncFinished { result } => {
                if let TriggerState::Syncing { reason } = self.state {
                    self.state = TriggerState::Idle;
                    actions.push(Action::EmitEvent(SyncEvent::Completed { reason, result }));

                    if let Some(next) = self.pending.take() {
                        match self.blocker() {
                            Some(cause) => actions.push(Action::EmitEvent(SyncEvent::Skipped {
                                reason: next,
                                cause,
                            })),
                            None => self.request(next, &mut actions),
                        }
                    }
                }
            }
        }

        (self, actions)
    }

    fn blocker(&self) -> Option<SkipCause> {
        if !self.started {
            Some(SkipCause::NotStarted)
        } else if !self.connected {
            Some(SkipCause::Offline)
        } else if !self.logged_in {
            Some(SkipCause::LoggedOut)
        } else {
            None
        }
    }

    fn request(&mut self, reason: SyncReason, actions: &mut Vec<Action>) {
        match self.state {
            TriggerState::Idle => {
                self.state = TriggerState::Syncing { reason };
                actions.push(Action::StartSync { reason });
                actions.push(Action::EmitEvent(SyncEvent::Started { reason }));
            }
            TriggerState::Syncing { .. } => {
                self.pending.get_or_insert(reason);
                actions.push(Action::EmitEvent(SyncEvent::Coalesced { reason }));
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Check if a sync is in flight.
    pub fn is_syncing(&self) -> bool {
        matches!(self.state, TriggerState::Syncing { .. })
    }

    /// Whether a follow-up sync is queued behind the running one.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Last observed connectivity.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Last observed session state.
    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// The policy this trigger runs with.
    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }
}

impl Default for SyncTrigger {
    fn default() -> Self {
        Self::new(TriggerPolicy::default())
    }
}
