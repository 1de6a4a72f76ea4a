//! Sync command - run one synchronization now
//!
//! Provides the `syncvault sync` CLI command which:
//! 1. Builds the profile, either from the configuration (`--profile`) or
//!    from command-line paths
//! 2. Runs the sync engine with progress printed as it goes
//! 3. Cancels cooperatively on Ctrl-C
//! 4. Displays the result summary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use syncvault_core::config::Config;
use syncvault_core::domain::{CancellationHandle, SyncProfile, SyncResult};
use syncvault_sync::engine::SyncEngine;
use syncvault_sync::logging::TracingLogSink;
use tracing::info;

use super::find_profile;
use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};

/// Name given to profiles built from command-line paths.
const AD_HOC_PROFILE: &str = "ad-hoc";

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Sync a profile from the configuration file
    #[arg(long, conflicts_with_all = ["source", "dest"])]
    pub profile: Option<String>,

    /// Source directory (ad-hoc sync)
    #[arg(long, required_unless_present = "profile", requires = "dest")]
    pub source: Option<PathBuf>,

    /// Destination directory (ad-hoc sync)
    #[arg(long, requires = "source")]
    pub dest: Option<PathBuf>,

    /// Where snapshots of overwritten files go
    #[arg(long)]
    pub backup_root: Option<PathBuf>,

    /// Snapshots kept per file
    #[arg(long)]
    pub retention: Option<u32>,

    /// Extra glob pattern to exclude (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter: Arc<dyn OutputFormatter> = Arc::from(get_formatter(format));
        let mut profile = self.build_profile(config)?;

        info!(
            profile = %profile.name(),
            dry_run = self.dry_run,
            "Running sync from the command line"
        );

        if self.dry_run {
            formatter.info("Dry run mode - no changes will be made");
        }
        formatter.info(&format!(
            "Syncing {} -> {}",
            profile.source().display(),
            profile.destination().display()
        ));

        let cancel = CancellationHandle::new();
        let ctrl_c_cancel = cancel.clone();
        let ctrl_c_formatter = formatter.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_formatter.warn("Interrupted, finishing the current file");
                ctrl_c_cancel.cancel();
            }
        });

        let engine = SyncEngine::new(Arc::new(TracingLogSink::new()));
        let progress_formatter = formatter.clone();
        let progress = move |message: &str| progress_formatter.progress(message);
        let result = engine
            .execute(&mut profile, self.dry_run, &progress, &cancel)
            .await;
        ctrl_c.abort();

        if format.is_json() {
            let json = serde_json::to_value(&result).context("Failed to serialize sync result")?;
            formatter.print_json(&json);
        } else {
            print_summary(formatter.as_ref(), &result, self.dry_run);
        }

        if let Some(error) = result.error {
            bail!("Sync failed: {error}");
        }
        Ok(())
    }

    /// Resolves the profile to run and applies command-line overrides.
    fn build_profile(&self, config: &Config) -> Result<SyncProfile> {
        let mut profile = match (&self.profile, &self.source, &self.dest) {
            (Some(name), _, _) => find_profile(config, name)?,
            (None, Some(source), Some(dest)) => {
                SyncProfile::new(AD_HOC_PROFILE, source.clone(), dest.clone())?
            }
            _ => bail!("Either --profile or both --source and --dest are required"),
        };

        if let Some(root) = &self.backup_root {
            profile = profile.with_backup_root(root.clone());
        }
        if let Some(retention) = self.retention {
            profile = profile.with_retention(retention)?;
        }
        if !self.excludes.is_empty() {
            let mut patterns = profile.exclude().to_vec();
            patterns.extend(self.excludes.iter().cloned());
            profile = profile.with_excludes(patterns);
        }

        profile
            .validate()
            .with_context(|| format!("Invalid profile '{}'", profile.name()))?;
        Ok(profile)
    }
}

fn print_summary(formatter: &dyn OutputFormatter, result: &SyncResult, dry_run: bool) {
    if !result.success {
        formatter.error(result.error.as_deref().unwrap_or("sync failed"));
        return;
    }

    let elapsed = format_duration(result.duration_ms);
    if result.cancelled {
        formatter.warn(&format!("Sync cancelled after {elapsed}"));
    } else if result.files_processed == 0 && result.files_failed == 0 {
        formatter.success("Already up to date");
    } else if dry_run {
        formatter.success(&format!("Dry run completed in {elapsed}"));
    } else {
        formatter.success(&format!("Sync completed in {elapsed}"));
    }

    let verb = if dry_run { "Would copy" } else { "Copied" };
    formatter.info(&format!(
        "{verb}:     {}",
        plural(u64::from(result.files_processed), "file")
    ));
    if result.files_backed_up > 0 {
        formatter.info(&format!(
            "Backed up:  {}",
            plural(u64::from(result.files_backed_up), "file")
        ));
    }
    formatter.info(&format!(
        "Skipped:    {}",
        plural(u64::from(result.files_skipped), "file")
    ));
    if result.destination_only > 0 {
        formatter.info(&format!(
            "Kept:       {} only in destination",
            plural(u64::from(result.destination_only), "file")
        ));
    }
    if result.files_failed > 0 {
        formatter.error(&format!(
            "{} could not be synced (see log)",
            plural(u64::from(result.files_failed), "file")
        ));
    }
}
