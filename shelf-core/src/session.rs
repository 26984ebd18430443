//! Session model for shelf-sync.
//!
//! A [`Session`] holds the authenticated user, if any. `logged_in` is derived
//! from the user, so the two can never disagree.
//!
//! Identity-service outcomes are folded in with [`Session::on_event`], which
//! returns the next session plus the actions the caller should execute
//! (publish the new state, write a report to the log sink).

use serde::Serialize;
use shelf_types::User;

/// The authenticated-user state for the current process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    /// A session with nobody signed in.
    pub fn logged_out() -> Self {
        Self { user: None }
    }

    /// A session for `user`.
    pub fn logged_in_as(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Whether a user is signed in.
    pub fn logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Process an identity-service outcome and return the new session plus
    /// actions to execute.
    ///
    /// Failed login and failed logout leave the session untouched. A failed
    /// refresh always ends logged out.
    pub fn on_event(self, event: SessionEvent) -> (Self, Vec<SessionAction>) {
        match event {
            SessionEvent::RefreshSucceeded { user } => {
                let report = SessionReport::Restored {
                    email: user.email.clone(),
                };
                self.replace(Self::logged_in_as(user), report)
            }
            SessionEvent::NoExistingSession => {
                self.replace(Self::logged_out(), SessionReport::NoSession)
            }
            SessionEvent::RefreshFailed { error } => {
                self.replace(Self::logged_out(), SessionReport::RefreshFailed { error })
            }
            SessionEvent::LoginSucceeded { user } => {
                let report = SessionReport::LoggedIn {
                    email: user.email.clone(),
                };
                self.replace(Self::logged_in_as(user), report)
            }
            SessionEvent::LoginFailed { error } => (
                self,
                vec![SessionAction::Report(SessionReport::LoginFailed { error })],
            ),
            SessionEvent::LogoutSucceeded => {
                self.replace(Self::logged_out(), SessionReport::LoggedOut)
            }
            SessionEvent::LogoutFailed { error } => (
                self,
                vec![SessionAction::Report(SessionReport::LogoutFailed { error })],
            ),
        }
    }

    fn replace(self, next: Self, report: SessionReport) -> (Self, Vec<SessionAction>) {
        let mut actions = Vec::with_capacity(2);
        if next != self {
            actions.push(SessionAction::Publish);
        }
        actions.push(SessionAction::Report(report));
        (next, actions)
    }
}

/// Outcomes reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An existing session was found and its profile fetched.
    RefreshSucceeded {
        /// The restored user.
        user: User,
    },
    /// The identity service has no current user.
    NoExistingSession,
    /// Looking up the existing session failed.
    RefreshFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Credentials accepted.
    LoginSucceeded {
        /// The signed-in user.
        user: User,
    },
    /// Credentials rejected or the call failed.
    LoginFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Sign-out completed.
    LogoutSucceeded,
    /// Sign-out failed.
    LogoutFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the session owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// The session value changed; notify subscribers.
    Publish,
    /// Write a status line to the log sink.
    Report(SessionReport),
}

/// Human-readable session status for the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReport {
    /// Existing session restored at startup or on refresh.
    Restored {
        /// Email of the restored account.
        email: String,
    },
    /// No existing session.
    NoSession,
    /// Refresh failed; treated as no session.
    RefreshFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Login succeeded.
    LoggedIn {
        /// Email of the account.
        email: String,
    },
    /// Login failed; session unchanged.
    LoginFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Logout succeeded.
    LoggedOut,
    /// Logout failed; session unchanged.
    LogoutFailed {
        /// Error message describing the failure.
        error: String,
    },
}

impl SessionReport {
    /// Whether this report describes a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RefreshFailed { .. } | Self::LoginFailed { .. } | Self::LogoutFailed { .. }
        )
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restored { email } => write!(f, "session restored for {}", email),
            Self::NoSession => write!(f, "no existing session"),
            Self::RefreshFailed { error } => write!(f, "session refresh failed: {}", error),
            Self::LoggedIn { email } => write!(f, "logged in as {}", email),
            Self::LoginFailed { error } => write!(f, "login failed: {}", error),
            Self::LoggedOut => write!(f, "logged out"),
            Self::LogoutFailed { error } => write!(f, "logout failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_types::UserId;

    fn reader() -> User {
        User {
            id: UserId::new("reader-1"),
            name: "Reader".into(),
            email: "reader@example.com".into(),
        }
    }

    fn consistent(session: &Session) -> bool {
        session.logged_in() == session.user().is_some()
    }

    #[test]
    fn starts_logged_out() {
        let session = Session::default();
        assert!(!session.logged_in());
        assert!(session.user().is_none());
    }

    #[test]
    fn refresh_success_logs_in() {
        let (session, actions) = Session::logged_out().on_event(SessionEvent::RefreshSucceeded {
            user: reader(),
        });
        assert!(session.logged_in());
        assert_eq!(session.user(), Some(&reader()));
        assert!(actions.contains(&SessionAction::Publish));
    }

    #[test]
    fn refresh_failure_always_logs_out() {
        let (session, actions) =
            Session::logged_in_as(reader()).on_event(SessionEvent::RefreshFailed {
                error: "network down".into(),
            });
        assert!(!session.logged_in());
        assert!(session.user().is_none());
        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Report(r) if r.is_failure()
        )));
    }

    #[test]
    fn no_existing_session_logs_out() {
        let (session, _) = Session::logged_in_as(reader()).on_event(SessionEvent::NoExistingSession);
        assert_eq!(session, Session::logged_out());
    }

    #[test]
    fn failed_login_leaves_session_unchanged() {
        for before in [Session::logged_out(), Session::logged_in_as(reader())] {
            let (after, actions) = before.clone().on_event(SessionEvent::LoginFailed {
                error: "bad password".into(),
            });
            assert_eq!(after, before);
            assert!(!actions.contains(&SessionAction::Publish));
        }
    }

    #[test]
    fn failed_logout_leaves_session_unchanged() {
        let before = Session::logged_in_as(reader());
        let (after, actions) = before.clone().on_event(SessionEvent::LogoutFailed {
            error: "offline".into(),
        });
        assert_eq!(after, before);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn logout_clears_user() {
        let (session, actions) =
            Session::logged_in_as(reader()).on_event(SessionEvent::LogoutSucceeded);
        assert!(!session.logged_in());
        assert!(actions.contains(&SessionAction::Publish));
    }

    #[test]
    fn unchanged_session_is_not_republished() {
        let (_, actions) = Session::logged_out().on_event(SessionEvent::NoExistingSession);
        assert_eq!(
            actions,
            vec![SessionAction::Report(SessionReport::NoSession)]
        );
    }

    #[test]
    fn logged_in_flag_never_disagrees_with_user() {
        let events = vec![
            SessionEvent::LoginSucceeded { user: reader() },
            SessionEvent::LogoutFailed { error: "x".into() },
            SessionEvent::RefreshFailed { error: "y".into() },
            SessionEvent::LoginFailed { error: "z".into() },
            SessionEvent::RefreshSucceeded { user: reader() },
            SessionEvent::LogoutSucceeded,
            SessionEvent::NoExistingSession,
        ];

        let mut session = Session::default();
        for event in events {
            let (next, _) = session.on_event(event);
            assert!(consistent(&next));
            session = next;
        }
    }

    #[test]
    fn report_display() {
        let report = SessionReport::LoginFailed {
            error: "bad password".into(),
        };
        assert_eq!(report.to_string(), "login failed: bad password");
        assert!(!SessionReport::LoggedOut.is_failure());
    }
}
