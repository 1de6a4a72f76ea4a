//! SyncVault Sync - one-way mirror engine with versioned backups
//!
//! Provides:
//! - Change detection (size pre-check, streamed SHA-256 digest)
//! - Snapshot-before-overwrite backups with retention-based rotation
//! - A sequential, cancellable sync engine with dry-run support
//! - A debounced filesystem change monitor and a scheduler that drives the engine
//!
//! ## Modules
//!
//! - [`compare`] - Decides whether a source file differs from its destination
//! - [`exclude`] - Reserved names, temp/lock-file rules and profile glob patterns
//! - [`backup`] - Timestamped snapshots and rotation
//! - [`engine`] - The sync run itself
//! - [`filesystem`] - Tree enumeration and atomic copies
//! - [`watcher`] - Filesystem watch registry with per-profile debouncing
//! - [`scheduler`] - Turns triggers into engine runs, one per profile at a time
//! - [`logging`] - `tracing`-backed [`LogSink`](syncvault_core::ports::LogSink)

pub mod backup;
pub mod compare;
pub mod engine;
pub mod exclude;
pub mod filesystem;
pub mod logging;
pub mod scheduler;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a sync run or a watch registration.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The profile's source directory does not exist.
    #[error("Source directory not found: {0}")]
    SourceMissing(PathBuf),

    /// The destination directory could not be created.
    #[error("Cannot create destination {path}: {source}")]
    DestinationUncreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backup root could not be created.
    #[error("Cannot create backup root {path}: {source}")]
    BackupRootUncreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the source or destination tree failed.
    #[error("Failed to enumerate {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A profile exclusion pattern is not a valid glob.
    #[error("Invalid exclusion pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The OS watcher could not be created or attached.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
