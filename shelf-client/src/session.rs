//! Session state holder.
//!
//! [`SessionStore`] is the only place the [`Session`] changes. A worker task
//! owns the value; every operation funnels its outcome through that task, in
//! order, and subscribers observe the result on a `watch` channel.
//!
//! # Architecture
//!
//! ```text
//! login()/logout()/refresh()  ──► IdentityService (caller's task)
//!          │                              │
//!          └── Begin(kind) ──► worker ◄── Complete(token, outcome)
//!                                │
//!                     shelf-core Session::on_event
//!                                │
//!                watch::Sender<Session> + ChangeFeed
//! ```
//!
//! Each operation takes an [`OpToken`] before it calls the identity service.
//! Starting a new operation supersedes every older one, so a completion that
//! arrives late is discarded instead of overwriting newer state.
//!
//! Every logged-in/logged-out change is also published on a [`ChangeFeed`],
//! after the `watch` value is updated and before the caller gets its reply.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use shelf_core::{OpKind, OpToken, OpTracker, Session, SessionAction, SessionEvent};
use shelf_types::{ServiceError, User};

use crate::feed::{Change, ChangeFeed};
use crate::services::IdentityService;

/// Depth of the worker's command queue.
const COMMAND_QUEUE: usize = 32;

/// Session operation errors.
///
/// None of these are fatal: the session is left in a consistent state and
/// the failure has already been written to the log.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The identity service rejected or failed the call.
    #[error("identity service error: {0}")]
    Service(#[from] ServiceError),

    /// The request was rejected before reaching the identity service.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A newer session operation started before this one completed.
    #[error("{0} superseded by a newer session operation")]
    Superseded(OpKind),

    /// The session worker has stopped.
    #[error("session worker stopped")]
    Closed,
}

enum Command {
    Begin {
        kind: OpKind,
        reply: oneshot::Sender<OpToken>,
    },
    Complete {
        token: OpToken,
        event: SessionEvent,
        reply: oneshot::Sender<Option<Session>>,
    },
}

/// Handle to the session state.
///
/// Cheap to clone; all clones talk to the same worker.
pub struct SessionStore<I: IdentityService> {
    identity: Arc<I>,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Session>,
}

impl<I: IdentityService> Clone for SessionStore<I> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }
}

impl<I: IdentityService + 'static> SessionStore<I> {
    /// Create a logged-out session store and spawn its worker.
    ///
    /// Call [`refresh_current_user`](Self::refresh_current_user) to pick up
    /// a persisted session.
    pub fn new(identity: I) -> Self {
        Self::with_feed(identity, ChangeFeed::new())
    }

    /// Create a logged-out session store that publishes session changes
    /// into `feed`.
    pub fn with_feed(identity: I, feed: ChangeFeed) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let (publisher, state) = watch::channel(Session::logged_out());

        let worker = SessionWorker {
            session: Session::logged_out(),
            ops: OpTracker::new(),
            publisher,
            feed,
        };
        tokio::spawn(worker.run(rx));

        Self {
            identity: Arc::new(identity),
            commands,
            state,
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Check if a user is signed in.
    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().logged_in()
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Ask the identity service for an existing session.
    ///
    /// Never fails: a missing session or any error leaves the store logged
    /// out (unless a newer operation has taken over in the meantime).
    pub async fn refresh_current_user(&self) -> Session {
        let token = match self.begin(OpKind::Refresh).await {
            Ok(token) => token,
            Err(_) => return self.current(),
        };

        let event = match self.identity.current_user_id().await {
            None => SessionEvent::NoExistingSession,
            Some(id) => match self.identity.fetch_user_profile(&id).await {
                Ok(profile) => SessionEvent::RefreshSucceeded {
                    user: User::from_profile(id, profile),
                },
                Err(e) => SessionEvent::RefreshFailed {
                    error: e.to_string(),
                },
            },
        };

        self.complete(token, event)
            .await
            .unwrap_or_else(|_| self.current())
    }

    /// Sign in. On failure the session is left exactly as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        if email.trim().is_empty() {
            tracing::warn!("Login rejected: email is empty");
            return Err(SessionError::InvalidInput("email must not be empty"));
        }
        if password.is_empty() {
            tracing::warn!("Login rejected: password is empty");
            return Err(SessionError::InvalidInput("password must not be empty"));
        }

        let token = self.begin(OpKind::Login).await?;
        let outcome = self.identity.login(email, password).await;
        let event = match &outcome {
            Ok(user) => SessionEvent::LoginSucceeded { user: user.clone() },
            Err(e) => SessionEvent::LoginFailed {
                error: e.to_string(),
            },
        };

        let session = self.complete(token, event).await?;
        outcome.map(|_| session).map_err(SessionError::from)
    }

    /// Sign out. On failure the session is left exactly as it was.
    pub async fn logout(&self) -> Result<Session, SessionError> {
        let token = self.begin(OpKind::Logout).await?;
        let outcome = self.identity.logout().await;
        let event = match &outcome {
            Ok(()) => SessionEvent::LogoutSucceeded,
            Err(e) => SessionEvent::LogoutFailed {
                error: e.to_string(),
            },
        };

        let session = self.complete(token, event).await?;
        outcome.map(|_| session).map_err(SessionError::from)
    }

    async fn begin(&self, kind: OpKind) -> Result<OpToken, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Begin { kind, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    async fn complete(&self, token: OpToken, event: SessionEvent) -> Result<Session, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Complete {
                token,
                event,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await
            .map_err(|_| SessionError::Closed)?
            .ok_or(SessionError::Superseded(token.kind()))
    }
}

/// Single writer for the session value.
struct SessionWorker {
    session: Session,
    ops: OpTracker,
    publisher: watch::Sender<Session>,
    feed: ChangeFeed,
}

impl SessionWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Begin { kind, reply } => {
                    if let Some(previous) = self.ops.in_flight() {
                        tracing::debug!("Session: {} supersedes in-flight {}", kind, previous.kind());
                    }
                    let _ = reply.send(self.ops.begin(kind));
                }
                Command::Complete {
                    token,
                    event,
                    reply,
                } => {
                    let _ = reply.send(self.apply(token, event));
                }
            }
        }
        tracing::debug!("Session worker stopped");
    }

    fn apply(&mut self, token: OpToken, event: SessionEvent) -> Option<Session> {
        if !self.ops.finish(token) {
            tracing::debug!("Session: discarding stale {} completion", token.kind());
            return None;
        }

        let was_logged_in = self.session.logged_in();
        let (next, actions) = self.session.clone().on_event(event);
        self.session = next;

        for action in actions {
            match action {
                SessionAction::Publish => {
                    self.publisher.send_replace(self.session.clone());
                    let logged_in = self.session.logged_in();
                    if logged_in != was_logged_in {
                        self.feed.publish(Change::Session { logged_in });
                    }
                }
                SessionAction::Report(report) if report.is_failure() => {
                    tracing::warn!("Session: {}", report);
                }
                SessionAction::Report(report) => {
                    tracing::info!("Session: {}", report);
                }
            }
        }

        Some(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockIdentity;
    use std::time::Duration;

    async fn eventually<F: Fn() -> bool>(check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn consistent(session: &Session) -> bool {
        session.logged_in() == session.user().is_some()
    }

    #[tokio::test]
    async fn starts_logged_out() {
        let store = SessionStore::new(MockIdentity::new());
        assert!(!store.is_logged_in());
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn refresh_restores_existing_session() {
        let identity = MockIdentity::new();
        let user = identity.add_account("ada@example.com", "pw", "Ada");
        identity.restore_session(&user.id);

        let store = SessionStore::new(identity);
        let session = store.refresh_current_user().await;

        assert!(session.logged_in());
        assert_eq!(store.user(), Some(user));
    }

    #[tokio::test]
    async fn refresh_without_session_is_logged_out() {
        let store = SessionStore::new(MockIdentity::new());
        let session = store.refresh_current_user().await;
        assert!(!session.logged_in());
        assert!(consistent(&session));
    }

    #[tokio::test]
    async fn failed_refresh_logs_out() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity.clone());
        store.login("ada@example.com", "pw").await.unwrap();
        assert!(store.is_logged_in());

        identity.fail_next_profile(ServiceError::Network("offline".into()));
        let session = store.refresh_current_user().await;

        assert!(!session.logged_in());
        assert!(session.user().is_none());
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn login_success_publishes() {
        let identity = MockIdentity::new();
        let user = identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity);
        let mut rx = store.subscribe();

        let session = store.login("ada@example.com", "pw").await.unwrap();

        assert_eq!(session.user(), Some(&user));
        rx.changed().await.unwrap();
        assert!(rx.borrow().logged_in());
    }

    #[tokio::test]
    async fn every_login_and_logout_reaches_the_feed() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        let feed = ChangeFeed::new();
        let mut changes = feed.subscribe();
        let store = SessionStore::with_feed(identity.clone(), feed);

        store.login("ada@example.com", "pw").await.unwrap();
        store.logout().await.unwrap();
        store.login("ada@example.com", "pw").await.unwrap();
        let _ = store.login("ada@example.com", "bad").await;

        for logged_in in [true, false, true] {
            assert_eq!(changes.try_recv().unwrap(), Change::Session { logged_in });
        }
        assert!(changes.try_recv().is_err(), "failed login changes nothing");
    }

    #[tokio::test]
    async fn failed_login_leaves_session_unchanged() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        identity.add_account("bob@example.com", "pw2", "Bob");
        let store = SessionStore::new(identity.clone());
        store.login("ada@example.com", "pw").await.unwrap();
        let before = store.current();

        let err = store.login("bob@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, SessionError::Service(ServiceError::Auth(_))));
        assert_eq!(store.current(), before);

        identity.fail_next_login(ServiceError::Timeout);
        assert!(store.login("bob@example.com", "pw2").await.is_err());
        assert_eq!(store.current(), before);
    }

    #[tokio::test]
    async fn empty_credentials_never_reach_the_service() {
        let identity = MockIdentity::new();
        let store = SessionStore::new(identity.clone());

        let err = store.login("  ", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        let err = store.login("ada@example.com", "").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));

        assert_eq!(identity.login_calls(), 0);
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity);
        store.login("ada@example.com", "pw").await.unwrap();

        let session = store.logout().await.unwrap();
        assert!(!session.logged_in());
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn failed_logout_keeps_user() {
        let identity = MockIdentity::new();
        let user = identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity.clone());
        store.login("ada@example.com", "pw").await.unwrap();

        identity.fail_next_logout(ServiceError::Network("offline".into()));
        assert!(store.logout().await.is_err());
        assert_eq!(store.user(), Some(user));
    }

    #[tokio::test]
    async fn stale_login_completion_is_discarded() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity.clone());

        let gate = identity.hold_next_login();
        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.login("ada@example.com", "pw").await })
        };
        eventually(|| identity.login_calls() == 1).await;

        // Requested after the login, so it must win even though it finishes first.
        store.logout().await.unwrap();
        gate.notify_one();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Superseded(OpKind::Login)));
        assert!(!store.is_logged_in());
    }

    #[tokio::test]
    async fn stale_refresh_does_not_clobber_login() {
        let identity = MockIdentity::new();
        let ada = identity.add_account("ada@example.com", "pw", "Ada");
        identity.add_account("bob@example.com", "pw2", "Bob");
        identity.restore_session(&ada.id);
        let store = SessionStore::new(identity.clone());

        let gate = identity.hold_next_profile();
        let refresh = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh_current_user().await })
        };
        eventually(|| identity.profile_fetches() == 1).await;

        let session = store.login("bob@example.com", "pw2").await.unwrap();
        gate.notify_one();
        let after_refresh = refresh.await.unwrap();

        assert_eq!(session.user().map(|u| u.email.as_str()), Some("bob@example.com"));
        assert_eq!(after_refresh, session);
        assert_eq!(store.current(), session);
    }

    #[tokio::test]
    async fn flag_and_user_agree_after_every_operation() {
        let identity = MockIdentity::new();
        identity.add_account("ada@example.com", "pw", "Ada");
        let store = SessionStore::new(identity.clone());

        assert!(consistent(&store.refresh_current_user().await));
        let _ = store.login("ada@example.com", "bad").await;
        assert!(consistent(&store.current()));
        let _ = store.login("ada@example.com", "pw").await;
        assert!(consistent(&store.current()));
        identity.fail_next_logout(ServiceError::Timeout);
        let _ = store.logout().await;
        assert!(consistent(&store.current()));
        assert!(consistent(&store.refresh_current_user().await));
        let _ = store.logout().await;
        assert!(consistent(&store.current()));
    }
}
