//! One-way synchronization engine
//!
//! The [`SyncEngine`] makes a profile's destination match its source for
//! every file present in the source, snapshotting destination files before
//! they are overwritten.
//!
//! ## Run Flow
//!
//! 1. **Validate**: the source must exist; destination and backup root are
//!    created if missing (not in dry-run mode)
//! 2. **Enumerate**: list every source file relative to the source root
//! 3. **Per file**: exclusion check, change detection, backup, atomic copy,
//!    snapshot rotation
//! 4. **Report**: log destination-only files, emit a summary, return a
//!    [`SyncResult`]
//!
//! ## Error Classes
//!
//! - Fatal (source missing, destination uncreatable, enumeration failure):
//!   the run stops before touching any file and `success` is false
//! - Per-file (parent dir or copy failure): logged, counted as failed, the
//!   run continues
//! - Advisory (backup or rotation failure): logged, the overwrite proceeds
//! - Soft stop (cancellation): partial counts, not an error
//!
//! Files are processed strictly one at a time in enumeration order. Files
//! that exist only in the destination are reported and never deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use syncvault_core::domain::{CancellationHandle, ProfileStatus, SyncProfile, SyncResult};
use syncvault_core::ports::{LogLevel, LogSink, ProgressSink};

use crate::backup::BackupManager;
use crate::compare::{self, Comparison};
use crate::exclude::ExclusionRules;
use crate::filesystem;
use crate::SyncError;

/// Failure confined to a single file.
#[derive(Debug, Error)]
pub enum FileSyncError {
    /// The destination's parent directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying the source over the destination failed.
    #[error("cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    /// Destination already matches.
    Unchanged,
    /// Copied (or would be, in dry-run mode).
    Copied {
        /// A backup of the previous destination content was attempted.
        backed_up: bool,
    },
}

/// Per-run parameters shared by every file of the run.
struct RunContext<'a> {
    profile: &'a SyncProfile,
    backups: BackupManager,
    dry_run: bool,
    progress: &'a dyn ProgressSink,
}

/// Sequential one-way sync engine.
///
/// Holds only the log sink; everything run-specific comes in through
/// [`execute`](SyncEngine::execute), so one engine can serve any number of
/// profiles. Callers must not run the same profile twice concurrently.
pub struct SyncEngine {
    log_sink: Arc<dyn LogSink>,
}

impl SyncEngine {
    /// Creates an engine that reports notable events to `log_sink`.
    pub fn new(log_sink: Arc<dyn LogSink>) -> Self {
        Self { log_sink }
    }

    fn log(&self, level: LogLevel, profile: &SyncProfile, message: &str) {
        self.log_sink.log(level, message, profile.name());
    }

    /// Runs one synchronization of `profile`.
    ///
    /// Never fails: fatal errors are reported through the returned
    /// [`SyncResult`] (`success == false`, `error` set). The profile's
    /// status label is updated to reflect the outcome.
    ///
    /// # Arguments
    /// * `profile` - The profile to sync; only its status label is modified
    /// * `dry_run` - Report what would change without touching the filesystem
    /// * `progress` - Receives human-readable status lines
    /// * `cancel` - Polled before each file; when set the run stops early
    #[tracing::instrument(skip(self, profile, progress, cancel), fields(profile = %profile.name()))]
    pub async fn execute(
        &self,
        profile: &mut SyncProfile,
        dry_run: bool,
        progress: &dyn ProgressSink,
        cancel: &CancellationHandle,
    ) -> SyncResult {
        let start = Instant::now();
        let mut result = SyncResult::new();

        profile.set_status(ProfileStatus::Syncing);
        let mode = if dry_run { "Dry run" } else { "Sync" };
        info!(
            source = %profile.source().display(),
            destination = %profile.destination().display(),
            dry_run,
            "Starting sync run"
        );
        self.log(
            LogLevel::Info,
            profile,
            &format!(
                "{mode} started: {} -> {}",
                profile.source().display(),
                profile.destination().display()
            ),
        );

        let outcome = self
            .run(profile, dry_run, progress, cancel, &mut result)
            .await;
        result.duration_ms = start.elapsed().as_millis() as u64;

        let summary = format!(
            "{} copied, {} backed up, {} skipped, {} failed",
            result.files_processed,
            result.files_backed_up,
            result.files_skipped,
            result.files_failed
        );

        match outcome {
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "Sync run failed");
                self.log(LogLevel::Error, profile, &format!("{mode} failed: {message}"));
                progress.report(&format!("{mode} failed: {message}"));
                profile.set_status(ProfileStatus::Failed(message.clone()));
                result.fail(message);
            }
            Ok(()) if result.cancelled => {
                self.log(
                    LogLevel::Warning,
                    profile,
                    &format!("{mode} cancelled: {summary}"),
                );
                progress.report(&format!("{mode} cancelled: {summary}"));
                profile.set_status(ProfileStatus::Cancelled);
            }
            Ok(()) => {
                self.log(
                    LogLevel::Success,
                    profile,
                    &format!("{mode} complete: {summary}"),
                );
                progress.report(&format!("{mode} complete: {summary}"));
                profile.set_status(ProfileStatus::Synced { at: Utc::now() });
            }
        }

        info!(
            processed = result.files_processed,
            backed_up = result.files_backed_up,
            skipped = result.files_skipped,
            failed = result.files_failed,
            destination_only = result.destination_only,
            cancelled = result.cancelled,
            duration_ms = result.duration_ms,
            "Sync run finished"
        );

        result
    }

    /// Body of a run; an `Err` is always fatal-to-run.
    async fn run(
        &self,
        profile: &SyncProfile,
        dry_run: bool,
        progress: &dyn ProgressSink,
        cancel: &CancellationHandle,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        // Step 1: Validate the source
        let source = profile.source();
        let source_is_dir = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !source_is_dir {
            return Err(SyncError::SourceMissing(source.to_path_buf()));
        }

        let rules = ExclusionRules::for_profile(profile)?;

        // Step 2: Destination
        let destination = profile.destination();
        let destination_err = |source| SyncError::DestinationUncreatable {
            path: destination.to_path_buf(),
            source,
        };
        let destination_exists = match tokio::fs::metadata(destination).await {
            Ok(meta) if meta.is_dir() => true,
            Ok(_) => {
                return Err(destination_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "a file with this name is in the way",
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(destination_err(e)),
        };
        if !destination_exists {
            if dry_run {
                progress.report(&format!(
                    "[dry run] Would create destination {}",
                    destination.display()
                ));
            } else {
                filesystem::ensure_dir(destination)
                    .await
                    .map_err(destination_err)?;
                debug!(path = %destination.display(), "Created destination directory");
            }
        }

        // Step 3: Backup root
        let backup_root = profile.effective_backup_root();
        if !dry_run {
            filesystem::ensure_dir(&backup_root)
                .await
                .map_err(|source| SyncError::BackupRootUncreatable {
                    path: backup_root.clone(),
                    source,
                })?;
        }

        // Step 4: Enumerate
        let files = filesystem::enumerate_files(source)
            .await
            .map_err(|e| SyncError::Enumeration {
                path: source.to_path_buf(),
                source: e,
            })?;
        progress.report(&format!(
            "Found {} files in {}",
            files.len(),
            source.display()
        ));

        let ctx = RunContext {
            profile,
            backups: BackupManager::new(backup_root),
            dry_run,
            progress,
        };

        // Step 5: Per-file loop
        for relative in &files {
            if cancel.is_cancelled() {
                info!(
                    processed = result.files_processed,
                    "Cancellation requested, stopping run"
                );
                progress.report("Cancellation requested, stopping");
                result.cancelled = true;
                break;
            }

            if rules.is_excluded(relative) {
                debug!(path = %relative.display(), "Excluded");
                result.files_skipped += 1;
                continue;
            }

            match self.sync_file(&ctx, relative).await {
                Ok(FileOutcome::Unchanged) => {
                    debug!(path = %relative.display(), "Unchanged");
                    result.files_skipped += 1;
                }
                Ok(FileOutcome::Copied { backed_up }) => {
                    result.files_processed += 1;
                    if backed_up {
                        result.files_backed_up += 1;
                    }
                }
                Err(err) => {
                    warn!(path = %relative.display(), error = %err, "File sync failed");
                    self.log(
                        LogLevel::Error,
                        profile,
                        &format!("Failed to sync {}: {err}", relative.display()),
                    );
                    result.files_failed += 1;
                }
            }
        }

        // Step 6: Destination-only files are reported, never deleted
        if !result.cancelled {
            let source_files: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
            result.destination_only = self
                .report_destination_only(&ctx, &source_files, &rules)
                .await;
        }

        Ok(())
    }

    /// Syncs a single file; errors stay confined to this file.
    async fn sync_file(
        &self,
        ctx: &RunContext<'_>,
        relative: &Path,
    ) -> Result<FileOutcome, FileSyncError> {
        let src = ctx.profile.source().join(relative);
        let dst = ctx.profile.destination().join(relative);

        if !ctx.dry_run {
            if let Some(parent) = dst.parent() {
                filesystem::ensure_dir(parent)
                    .await
                    .map_err(|source| FileSyncError::CreateParent {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let comparison = compare::compare(&src, &dst).await;
        if !comparison.is_changed() {
            return Ok(FileOutcome::Unchanged);
        }
        let dest_exists = comparison != Comparison::Missing;

        if ctx.dry_run {
            let note = if dest_exists {
                " (current version would be backed up)"
            } else {
                ""
            };
            ctx.progress.report(&format!(
                "[dry run] Would copy {}{note}",
                relative.display()
            ));
            return Ok(FileOutcome::Copied {
                backed_up: dest_exists,
            });
        }

        ctx.progress
            .report(&format!("Copying {}", relative.display()));

        if dest_exists {
            match ctx.backups.backup(&dst).await {
                Ok(snapshot) => {
                    debug!(snapshot = %snapshot.display(), "Backed up previous version");
                }
                Err(err) => {
                    self.log(
                        LogLevel::Warning,
                        ctx.profile,
                        &format!(
                            "Backup of {} failed, overwriting anyway: {err}",
                            relative.display()
                        ),
                    );
                }
            }
        }

        filesystem::copy_atomic(&src, &dst)
            .await
            .map_err(|source| FileSyncError::Copy {
                from: src.clone(),
                to: dst.clone(),
                source,
            })?;

        if dest_exists {
            if let Some(file_name) = dst.file_name() {
                let folder = ctx.backups.folder_for(file_name);
                let report =
                    BackupManager::rotate(&folder, ctx.profile.retention() as usize).await;
                if !report.removed.is_empty() {
                    debug!(
                        removed = report.removed.len(),
                        kept = report.kept,
                        "Rotated snapshots"
                    );
                }
                for (path, err) in &report.failures {
                    self.log(
                        LogLevel::Warning,
                        ctx.profile,
                        &format!("Snapshot rotation failed for {}: {err}", path.display()),
                    );
                }
            }
        }

        Ok(FileOutcome::Copied {
            backed_up: dest_exists,
        })
    }

    /// Logs files present only in the destination and returns how many there are.
    ///
    /// Failure to walk the destination is only a warning; this step is
    /// informational.
    async fn report_destination_only(
        &self,
        ctx: &RunContext<'_>,
        source_files: &HashSet<&Path>,
        rules: &ExclusionRules,
    ) -> u32 {
        let destination = ctx.profile.destination();
        if !path_exists(destination).await {
            return 0;
        }

        let dest_files = match filesystem::enumerate_files(destination).await {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "Cannot scan destination for extra files");
                return 0;
            }
        };

        // A backup root placed inside the destination is not "extra" content.
        let backup_prefix = ctx
            .backups
            .root()
            .strip_prefix(destination)
            .ok()
            .map(Path::to_path_buf);

        let mut count = 0;
        for relative in dest_files {
            if source_files.contains(relative.as_path()) || rules.is_excluded(&relative) {
                continue;
            }
            if backup_prefix
                .as_deref()
                .is_some_and(|prefix| relative.starts_with(prefix))
            {
                continue;
            }
            count += 1;
            self.log(
                LogLevel::Info,
                ctx.profile,
                &format!(
                    "{} exists only in the destination; keeping it",
                    relative.display()
                ),
            );
        }

        if count > 0 {
            info!(count, "Files present only in destination were kept");
        }
        count
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
