//! SyncProfile domain entity
//!
//! A profile names one source → destination relationship together with its
//! backup location, retention policy and auto-sync flag. Profiles are owned
//! by configuration; the sync core only ever mutates the status label.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Number of snapshots kept per file when a profile does not say otherwise.
pub const DEFAULT_RETENTION: u32 = 3;

/// Folder name used both for the derived backup root and as a reserved
/// name that is never synchronized.
pub const BACKUP_DIR_NAME: &str = "SyncManagerBackups";

fn default_retention() -> u32 {
    DEFAULT_RETENTION
}

/// Status label of a profile, updated by the engine as a side-effect signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// No run has happened since the profile was loaded.
    #[default]
    Idle,
    /// A run is in progress.
    Syncing,
    /// The last run finished successfully at the given instant.
    Synced {
        /// When the run finished.
        at: DateTime<Utc>,
    },
    /// The last run was cancelled before finishing.
    Cancelled,
    /// The last run failed with a fatal error.
    Failed(String),
}

impl ProfileStatus {
    /// Returns true while a run is in progress.
    pub fn is_syncing(&self) -> bool {
        matches!(self, ProfileStatus::Syncing)
    }
}

impl std::fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileStatus::Idle => write!(f, "idle"),
            ProfileStatus::Syncing => write!(f, "syncing"),
            ProfileStatus::Synced { at } => {
                write!(f, "last sync {}", at.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            ProfileStatus::Cancelled => write!(f, "cancelled"),
            ProfileStatus::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// One named source → destination synchronization relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProfile {
    /// Unique key of the profile.
    name: String,
    /// Directory whose files are mirrored.
    source: PathBuf,
    /// Directory that is made to match the source.
    destination: PathBuf,
    /// Explicit backup root; derived from the user documents dir when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_root: Option<PathBuf>,
    /// Maximum snapshots kept per file.
    #[serde(default = "default_retention")]
    retention: u32,
    /// Whether the profile is watched and synced automatically.
    #[serde(default)]
    auto_sync: bool,
    /// Extra glob patterns, relative to the source root, that are never synced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclude: Vec<String>,
    /// Runtime status label (never persisted).
    #[serde(skip)]
    status: ProfileStatus,
    /// When the profile was created.
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl SyncProfile {
    /// Creates a new profile with default retention and auto-sync disabled.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidProfileName`] if the name is blank.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidProfileName(name));
        }

        Ok(Self {
            name,
            source: source.into(),
            destination: destination.into(),
            backup_root: None,
            retention: DEFAULT_RETENTION,
            auto_sync: false,
            exclude: Vec::new(),
            status: ProfileStatus::Idle,
            created_at: Utc::now(),
        })
    }

    /// Sets an explicit backup root.
    pub fn with_backup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.backup_root = Some(root.into());
        self
    }

    /// Sets the retention count.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidRetention`] when `retention` is zero.
    pub fn with_retention(mut self, retention: u32) -> Result<Self, DomainError> {
        if retention == 0 {
            return Err(DomainError::InvalidRetention(retention));
        }
        self.retention = retention;
        Ok(self)
    }

    /// Enables or disables automatic syncing.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Adds extra exclusion glob patterns.
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Explicit backup root, if one was configured.
    pub fn backup_root(&self) -> Option<&Path> {
        self.backup_root.as_deref()
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn status(&self) -> &ProfileStatus {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Updates the status label.
    pub fn set_status(&mut self, status: ProfileStatus) {
        self.status = status;
    }

    /// Backup root used for this profile.
    ///
    /// The explicit root when configured, otherwise
    /// `<user-documents>/SyncManagerBackups/<name>`.
    pub fn effective_backup_root(&self) -> PathBuf {
        match &self.backup_root {
            Some(root) => root.clone(),
            None => default_backup_base().join(&self.name),
        }
    }

    /// Checks the invariants a profile loaded from configuration must hold.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidProfileName(self.name.clone()));
        }
        if self.retention == 0 {
            return Err(DomainError::InvalidRetention(self.retention));
        }
        if self.source.as_os_str().is_empty() {
            return Err(DomainError::InvalidPath("source path is empty".into()));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(DomainError::InvalidPath("destination path is empty".into()));
        }
        if self.destination.starts_with(&self.source) || self.source.starts_with(&self.destination)
        {
            return Err(DomainError::OverlappingPaths {
                source_path: self.source.display().to_string(),
                destination: self.destination.display().to_string(),
            });
        }
        Ok(())
    }
}

/// Parent directory of every derived backup root.
///
/// Typically `$HOME/Documents/SyncManagerBackups`.
pub fn default_backup_base() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BACKUP_DIR_NAME)
}
