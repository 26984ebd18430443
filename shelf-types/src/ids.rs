//! Identity types for shelf-sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account in the remote identity service.
///
/// Opaque to the coordinator; the identity service decides its format.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identifier issued by the identity service.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a random UserId (UUID v4, for testing and mocks).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "UserId({})", short)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_unique() {
        assert_ne!(UserId::random(), UserId::random());
    }

    #[test]
    fn debug_is_truncated() {
        let id = UserId::new("abcdefghijklmnop");
        assert_eq!(format!("{:?}", id), "UserId(abcdefgh)");
        assert_eq!(id.to_string(), "abcdefghijklmnop");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = UserId::new("u-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u-42\"");
    }
}
