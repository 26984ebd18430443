//! Outcome of a synchronization attempt.

use serde::{Deserialize, Serialize};

/// Summary of one `sync_all` call.
///
/// Immutable once produced. A result carrying errors is never successful:
/// the constructors and deserialization both enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSyncResult")]
pub struct SyncResult {
    success: bool,
    last_sync_time: Option<u64>,
    synced_item_count: u64,
    errors: Vec<String>,
}

impl SyncResult {
    /// Build a result. `success` is forced to `false` when `errors` is non-empty.
    pub fn new(
        success: bool,
        last_sync_time: Option<u64>,
        synced_item_count: u64,
        errors: Vec<String>,
    ) -> Self {
        Self {
            success: success && errors.is_empty(),
            last_sync_time,
            synced_item_count,
            errors,
        }
    }

    /// A clean sync of `synced_item_count` items finishing at `at` (Unix seconds).
    pub fn succeeded(synced_item_count: u64, at: u64) -> Self {
        Self::new(true, Some(at), synced_item_count, Vec::new())
    }

    /// A failed sync with the given error descriptions.
    pub fn failed<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            errors.push("sync failed".to_string());
        }
        Self::new(false, None, 0, errors)
    }

    /// Whether the sync completed without errors.
    pub fn success(&self) -> bool {
        self.success
    }

    /// When the remote side last completed a sync (Unix seconds), if known.
    pub fn last_sync_time(&self) -> Option<u64> {
        self.last_sync_time
    }

    /// Number of items reconciled.
    pub fn synced_item_count(&self) -> u64 {
        self.synced_item_count
    }

    /// Error descriptions, in the order they occurred.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

#[derive(Deserialize)]
struct RawSyncResult {
    success: bool,
    #[serde(default)]
    last_sync_time: Option<u64>,
    #[serde(default)]
    synced_item_count: u64,
    #[serde(default)]
    errors: Vec<String>,
}

impl From<RawSyncResult> for SyncResult {
    fn from(raw: RawSyncResult) -> Self {
        Self::new(
            raw.success,
            raw.last_sync_time,
            raw.synced_item_count,
            raw.errors,
        )
    }
}
