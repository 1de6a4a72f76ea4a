//! Outcome of one sync run

use serde::{Deserialize, Serialize};

/// Summary of a completed (or cancelled, or failed) sync run.
///
/// Created fresh for every run and handed back to the caller; the sync core
/// never persists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// False only when a fatal, run-level error occurred.
    pub success: bool,
    /// Files that were copied (or would be, in dry-run mode).
    pub files_processed: u32,
    /// Destination files for which a snapshot was attempted before overwrite.
    pub files_backed_up: u32,
    /// Files that were excluded or unchanged.
    pub files_skipped: u32,
    /// Files whose individual sync failed.
    pub files_failed: u32,
    /// Files present only in the destination (kept, never deleted).
    pub destination_only: u32,
    /// Whether the run stopped early because cancellation was requested.
    pub cancelled: bool,
    /// Fatal error message, if any.
    pub error: Option<String>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl SyncResult {
    /// Creates an empty, successful result.
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Marks the result as failed with a fatal error message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error = Some(message.into());
    }

    /// Number of files the run looked at.
    pub fn files_seen(&self) -> u32 {
        self.files_processed + self.files_skipped + self.files_failed
    }
}
