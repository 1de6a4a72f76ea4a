//! Profiles command - list configured sync profiles

use anyhow::Result;
use clap::Args;
use syncvault_core::config::Config;
use syncvault_core::domain::SyncProfile;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ProfilesCommand {}

impl ProfilesCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        if format.is_json() {
            let profiles: Vec<serde_json::Value> =
                config.profiles.iter().map(profile_json).collect();
            formatter.print_json(&serde_json::json!({ "profiles": profiles }));
            return Ok(());
        }

        if config.profiles.is_empty() {
            formatter.warn("No profiles configured");
            return Ok(());
        }

        for profile in &config.profiles {
            let auto = if profile.auto_sync() { " [auto]" } else { "" };
            formatter.success(&format!("{}{auto}", profile.name()));
            formatter.info(&format!("Source:      {}", profile.source().display()));
            formatter.info(&format!("Destination: {}", profile.destination().display()));
            formatter.info(&format!(
                "Backups:     {} (keep {})",
                profile.effective_backup_root().display(),
                profile.retention()
            ));
            if !profile.exclude().is_empty() {
                formatter.info(&format!("Excludes:    {}", profile.exclude().join(", ")));
            }
        }
        Ok(())
    }
}

fn profile_json(profile: &SyncProfile) -> serde_json::Value {
    serde_json::json!({
        "name": profile.name(),
        "source": profile.source(),
        "destination": profile.destination(),
        "backup_root": profile.effective_backup_root(),
        "retention": profile.retention(),
        "auto_sync": profile.auto_sync(),
        "exclude": profile.exclude(),
    })
}
