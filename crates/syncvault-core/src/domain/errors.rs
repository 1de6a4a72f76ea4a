//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures when building profiles.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Profile name is empty or otherwise unusable as a key.
    #[error("Invalid profile name: {0:?}")]
    InvalidProfileName(String),

    /// Invalid path format or content.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Retention must keep at least one snapshot.
    #[error("Invalid retention count: {0} (must be at least 1)")]
    InvalidRetention(u32),

    /// Source and destination overlap in a way that would recurse.
    #[error("Source and destination overlap: {source_path} / {destination}")]
    OverlappingPaths {
        /// The profile's source path.
        source_path: String,
        /// The profile's destination path.
        destination: String,
    },

    /// Generic validation failure.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
