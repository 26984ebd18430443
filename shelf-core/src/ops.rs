//! In-flight operation tokens for session-mutating calls.
//!
//! Every `refresh`, `login`, or `logout` takes a token before it calls the
//! identity service. Starting a new operation supersedes every earlier one,
//! so when completions arrive out of order only the most recently requested
//! operation may still change the session.

use std::fmt;

/// Kind of session-mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Re-query the identity service for an existing session.
    Refresh,
    /// Sign in with credentials.
    Login,
    /// Sign out.
    Logout,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Refresh => "refresh",
            Self::Login => "login",
            Self::Logout => "logout",
        };
        f.write_str(name)
    }
}

/// Token identifying one in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpToken {
    kind: OpKind,
    generation: u64,
}

impl OpToken {
    /// The kind of operation this token was issued for.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Monotonic issue number.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Single-slot tracker: only the newest token is current.
#[derive(Debug, Default)]
pub struct OpTracker {
    issued: u64,
    current: Option<OpToken>,
}

impl OpTracker {
    /// Create a tracker with nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an operation, superseding whatever was in flight.
    pub fn begin(&mut self, kind: OpKind) -> OpToken {
        self.issued = self.issued.wrapping_add(1);
        let token = OpToken {
            kind,
            generation: self.issued,
        };
        self.current = Some(token);
        token
    }

    /// Whether `token` is still the newest operation.
    pub fn is_current(&self, token: OpToken) -> bool {
        self.current == Some(token)
    }

    /// Finish an operation. Returns `false` (and changes nothing) when the
    /// token was superseded.
    pub fn finish(&mut self, token: OpToken) -> bool {
        if self.is_current(token) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// The operation currently in flight, if any.
    pub fn in_flight(&self) -> Option<OpToken> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_has_nothing_in_flight() {
        assert!(OpTracker::new().in_flight().is_none());
    }

    #[test]
    fn begin_then_finish() {
        let mut ops = OpTracker::new();
        let token = ops.begin(OpKind::Login);
        assert!(ops.is_current(token));
        assert!(ops.finish(token));
        assert!(ops.in_flight().is_none());
    }

    #[test]
    fn newer_operation_supersedes_older() {
        let mut ops = OpTracker::new();
        let login = ops.begin(OpKind::Login);
        let logout = ops.begin(OpKind::Logout);

        assert!(!ops.finish(login), "stale login must be rejected");
        assert_eq!(ops.in_flight(), Some(logout));
        assert!(ops.finish(logout));
    }

    #[test]
    fn same_kind_supersedes() {
        let mut ops = OpTracker::new();
        let first = ops.begin(OpKind::Refresh);
        let second = ops.begin(OpKind::Refresh);
        assert_ne!(first, second);
        assert!(second.generation() > first.generation());
        assert!(!ops.is_current(first));
    }

    #[test]
    fn finished_token_cannot_finish_twice() {
        let mut ops = OpTracker::new();
        let token = ops.begin(OpKind::Logout);
        assert!(ops.finish(token));
        assert!(!ops.finish(token));
    }
}
