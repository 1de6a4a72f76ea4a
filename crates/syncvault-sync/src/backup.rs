//! Versioned backups of overwritten destination files
//!
//! Before the engine overwrites a destination file it asks the
//! [`BackupManager`] for a snapshot. Snapshots live in one folder per file
//! name under the profile's backup root:
//!
//! ```text
//! <backup-root>/report.docx/report_20240131_174502.docx
//! <backup-root>/report.docx/report_20240201_090011.docx
//! ```
//!
//! After the copy the engine calls [`BackupManager::rotate`], which keeps the
//! newest `retention` snapshots (by creation time) and deletes the rest.
//!
//! Timestamps have one-second granularity. Two backups of the same file
//! within the same second produce the same snapshot name and the second one
//! replaces the first.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::filesystem;

/// Timestamp format embedded in snapshot names.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Errors raised while creating or listing snapshots.
///
/// The engine treats every one of these as advisory: it logs them and goes
/// on to overwrite the destination anyway.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The destination path has no file name component.
    #[error("Cannot derive a snapshot name from {0}")]
    InvalidFileName(PathBuf),

    /// The per-file backup folder could not be created.
    #[error("Cannot create backup folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying the current destination content failed.
    #[error("Cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the backup folder failed.
    #[error("Cannot list snapshots in {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A snapshot file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    /// Creation time, or modification time where the platform has no birth time.
    pub created: SystemTime,
    pub size: u64,
}

impl Snapshot {
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// Outcome of one rotation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationReport {
    /// Snapshots still present after rotation.
    pub kept: usize,
    /// Snapshots deleted.
    pub removed: Vec<PathBuf>,
    /// Snapshots that should have been deleted but could not be.
    pub failures: Vec<(PathBuf, String)>,
}

/// Creates and prunes snapshots under one backup root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding the snapshots of files named `file_name`.
    pub fn folder_for(&self, file_name: &OsStr) -> PathBuf {
        self.root.join(file_name)
    }

    /// Snapshot file name for `file_name` taken at `at`.
    ///
    /// `report.docx` becomes `report_20240131_174502.docx`; names without an
    /// extension just get the timestamp appended.
    pub fn snapshot_name(file_name: &OsStr, at: DateTime<Local>) -> String {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stamp = at.format(SNAPSHOT_TIMESTAMP_FORMAT);

        match path.extension() {
            Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{stamp}"),
        }
    }

    /// Snapshots the current content of `dest_file`, stamped with the local time.
    pub async fn backup(&self, dest_file: &Path) -> Result<PathBuf, BackupError> {
        self.backup_at(dest_file, Local::now()).await
    }

    /// Snapshots the current content of `dest_file` using the given timestamp.
    ///
    /// # Errors
    /// Returns a [`BackupError`] if the folder cannot be created or the copy
    /// fails. Nothing is rolled back; a failed backup leaves at most an
    /// empty folder behind.
    pub async fn backup_at(
        &self,
        dest_file: &Path,
        at: DateTime<Local>,
    ) -> Result<PathBuf, BackupError> {
        let file_name = dest_file
            .file_name()
            .ok_or_else(|| BackupError::InvalidFileName(dest_file.to_path_buf()))?;

        let folder = self.folder_for(file_name);
        filesystem::ensure_dir(&folder)
            .await
            .map_err(|source| BackupError::CreateFolder {
                path: folder.clone(),
                source,
            })?;

        let snapshot = folder.join(Self::snapshot_name(file_name, at));
        if tokio::fs::try_exists(&snapshot).await.unwrap_or(false) {
            debug!(snapshot = %snapshot.display(), "Replacing snapshot taken in the same second");
        }

        filesystem::copy_atomic(dest_file, &snapshot)
            .await
            .map_err(|source| BackupError::Copy {
                from: dest_file.to_path_buf(),
                to: snapshot.clone(),
                source,
            })?;

        info!(snapshot = %snapshot.display(), "Snapshot created");
        Ok(snapshot)
    }

    /// Lists the snapshots in `folder`, newest first.
    ///
    /// A missing folder yields an empty list.
    pub async fn list_snapshots(folder: &Path) -> Result<Vec<Snapshot>, BackupError> {
        let list_err = |source: std::io::Error| BackupError::List {
            path: folder.to_path_buf(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_err(e)),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    // Deleted between readdir and stat.
                    debug!(path = %entry.path().display(), error = %e, "Skipping unreadable snapshot");
                    continue;
                }
            };
            if !meta.is_file() || filesystem::is_in_flight_copy(&entry.path()) {
                continue;
            }
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            snapshots.push(Snapshot {
                path: entry.path(),
                created,
                size: meta.len(),
            });
        }

        snapshots.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.path.cmp(&a.path))
        });
        Ok(snapshots)
    }

    /// Deletes every snapshot in `folder` beyond the newest `retention`.
    ///
    /// Individual deletion failures are recorded in the report and do not
    /// stop the pass.
    pub async fn rotate(folder: &Path, retention: usize) -> RotationReport {
        let mut report = RotationReport::default();

        let snapshots = match Self::list_snapshots(folder).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "Cannot list snapshots for rotation");
                report.failures.push((folder.to_path_buf(), e.to_string()));
                return report;
            }
        };

        report.kept = snapshots.len().min(retention);
        Self::remove_expired(snapshots.into_iter().skip(retention), &mut report).await;
        report
    }

    /// Deletes each snapshot in turn, recording failures without stopping.
    async fn remove_expired(
        expired: impl IntoIterator<Item = Snapshot>,
        report: &mut RotationReport,
    ) {
        for snapshot in expired {
            match tokio::fs::remove_file(&snapshot.path).await {
                Ok(()) => {
                    debug!(snapshot = %snapshot.path.display(), "Rotated out old snapshot");
                    report.removed.push(snapshot.path);
                }
                Err(e) => {
                    warn!(snapshot = %snapshot.path.display(), error = %e, "Failed to delete old snapshot");
                    report.kept += 1;
                    report.failures.push((snapshot.path, e.to_string()));
                }
            }
        }
    }
}
