//! The signed-in reader.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// Profile fields stored by the identity service for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name.
    pub name: String,
    /// Account email address.
    pub email: String,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account email address.
    pub email: String,
}

impl User {
    /// Build a user from an id and the profile fetched for it.
    pub fn from_profile(id: UserId, profile: UserProfile) -> Self {
        Self {
            id,
            name: profile.name,
            email: profile.email,
        }
    }
}
