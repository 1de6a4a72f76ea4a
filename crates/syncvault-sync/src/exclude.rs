//! Exclusion rules for sync runs and noise filtering for the change monitor
//!
//! Two rule sets live here:
//!
//! - [`ExclusionRules`] decides which source files a sync run never copies.
//!   The built-in rules cover the metadata marker, the reserved backup
//!   folder, the system-reserved folder, temp files and office lock files;
//!   profiles may add glob patterns on top.
//! - [`is_ignored_event`] and [`EventFilter`] decide which filesystem events
//!   the change monitor drops before they reach the debounce timer.
//!
//! All matching is case-sensitive and works on paths relative to the source
//! root.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use syncvault_core::domain::{SyncProfile, BACKUP_DIR_NAME};

use crate::SyncError;

/// Synchronization metadata marker file.
pub const METADATA_MARKER: &str = ".syncvault";

/// Folder reserved by the operating system on removable volumes.
pub const SYSTEM_FOLDER: &str = "System Volume Information";

/// Any path containing this is treated as a temporary file.
pub const TEMP_MARKER: &str = ".tmp";

/// Prefix of office-suite lock files (`~$report.docx`).
pub const OFFICE_LOCK_PREFIX: &str = "~$";

/// Extensions of partial or temporary downloads ignored by the monitor.
pub const IGNORED_EVENT_EXTENSIONS: &[&str] = &[
    "tmp",
    "temp",
    "crdownload",
    "part",
    "partial",
    "download",
    "swp",
];

/// File name prefixes of lock files ignored by the monitor.
pub const IGNORED_EVENT_PREFIXES: &[&str] = &[OFFICE_LOCK_PREFIX, ".~lock."];

/// Rules deciding which source files a sync run skips.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ExclusionRules {
    /// Built-in rules only.
    pub fn builtin() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Built-in rules plus the given glob patterns.
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidPattern`] for the first pattern that does
    /// not compile.
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SyncError> {
        let mut builder = GlobSetBuilder::new();
        let mut raw = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| SyncError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
            raw.push(pattern.to_string());
        }

        let glob_set = builder.build().map_err(|e| SyncError::InvalidPattern {
            pattern: raw.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            glob_set,
            patterns: raw,
        })
    }

    /// Rules for a profile: built-ins plus the profile's own patterns.
    pub fn for_profile(profile: &SyncProfile) -> Result<Self, SyncError> {
        Self::with_patterns(profile.exclude())
    }

    /// Extra patterns configured on top of the built-in rules.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if the file at `relative` must not be synced.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        is_builtin_excluded(relative) || self.glob_set.is_match(relative)
    }
}

/// Built-in exclusion check on a path relative to the source root.
pub fn is_builtin_excluded(relative: &Path) -> bool {
    let reserved_component = relative.components().any(|c| match c {
        Component::Normal(name) => {
            name == METADATA_MARKER || name == BACKUP_DIR_NAME || name == SYSTEM_FOLDER
        }
        _ => false,
    });
    if reserved_component {
        return true;
    }

    // Lock files may sit at any depth, so the prefix is searched anywhere.
    let text = relative.to_string_lossy();
    text.contains(TEMP_MARKER) || text.contains(OFFICE_LOCK_PREFIX)
}

/// Returns true if a filesystem event for `path` is noise.
///
/// Only the file name is inspected, so this never touches the disk and works
/// for paths that no longer exist.
pub fn is_ignored_event(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };

    if IGNORED_EVENT_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return true;
    }

    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| IGNORED_EVENT_EXTENSIONS.contains(&ext.as_ref()))
}

/// Per-profile event filter used by the change monitor.
///
/// On top of [`is_ignored_event`] it drops everything under the profile's
/// backup root, so snapshots written into a watched source never trigger
/// another sync.
#[derive(Debug, Clone)]
pub struct EventFilter {
    backup_roots: Vec<PathBuf>,
}

impl EventFilter {
    /// Builds the filter for `profile`.
    ///
    /// The canonical form of the backup root is matched too, since some
    /// platforms report events with symlinks resolved.
    pub fn for_profile(profile: &SyncProfile) -> Self {
        let root = profile.effective_backup_root();
        let mut backup_roots = Vec::with_capacity(2);
        if let Ok(canonical) = std::fs::canonicalize(&root) {
            if canonical != root {
                backup_roots.push(canonical);
            }
        }
        backup_roots.push(root);
        Self { backup_roots }
    }

    /// Returns true if an event for `path` must not restart the quiet period.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.backup_roots.iter().any(|root| path.starts_with(root)) || is_ignored_event(path)
    }
}
