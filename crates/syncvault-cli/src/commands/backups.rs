//! Backups command - list the snapshots kept for one file
//!
//! Snapshots live in `<backup-root>/<file name>/`, so the lookup only needs
//! the profile and the file's name.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use syncvault_core::config::Config;
use syncvault_sync::backup::BackupManager;

use super::find_profile;
use crate::output::{format_size, get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct BackupsCommand {
    /// Profile whose backup root is searched
    pub profile: String,

    /// File (path or bare name) to list snapshots for
    pub file: PathBuf,
}

impl BackupsCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let profile = find_profile(config, &self.profile)?;

        let file_name = self
            .file
            .file_name()
            .with_context(|| format!("'{}' does not name a file", self.file.display()))?;
        let manager = BackupManager::new(profile.effective_backup_root());
        let folder = manager.folder_for(file_name);
        let snapshots = BackupManager::list_snapshots(&folder)
            .await
            .with_context(|| format!("Failed to list snapshots in {}", folder.display()))?;

        if format.is_json() {
            let entries: Vec<serde_json::Value> = snapshots
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "path": s.path,
                        "created": DateTime::<Local>::from(s.created).to_rfc3339(),
                        "size": s.size,
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({
                "profile": profile.name(),
                "file": file_name.to_string_lossy(),
                "snapshots": entries,
            }));
            return Ok(());
        }

        if snapshots.is_empty() {
            formatter.warn(&format!(
                "No snapshots of {} in {}",
                file_name.to_string_lossy(),
                folder.display()
            ));
            return Ok(());
        }

        formatter.success(&format!(
            "{} of {} (newest first)",
            plural(snapshots.len() as u64, "snapshot"),
            file_name.to_string_lossy()
        ));
        for snapshot in &snapshots {
            let created = DateTime::<Local>::from(snapshot.created);
            formatter.info(&format!(
                "{}  {:>10}  {}",
                created.format("%Y-%m-%d %H:%M:%S"),
                format_size(snapshot.size),
                snapshot.path.display()
            ));
        }
        Ok(())
    }
}
