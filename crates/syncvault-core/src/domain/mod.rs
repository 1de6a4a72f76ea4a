//! Domain entities
//!
//! This module contains the core domain types for SyncVault:
//! - Sync profiles and their status label
//! - Per-run sync results
//! - Cooperative cancellation handles
//! - Domain-specific error types

pub mod cancellation;
pub mod errors;
pub mod profile;
pub mod result;

// Re-export commonly used types
pub use cancellation::CancellationHandle;
pub use errors::DomainError;
pub use profile::{ProfileStatus, SyncProfile, BACKUP_DIR_NAME, DEFAULT_RETENTION};
pub use result::SyncResult;
