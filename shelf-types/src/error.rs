//! Error types for the remote services.

use thiserror::Error;

/// Errors reported by the identity, sync, and connectivity services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Network path unavailable or request failed in transit.
    #[error("network error: {0}")]
    Network(String),

    /// Credentials rejected or session expired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// The service is not available (monitor stopped, backend down).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
