//! SyncVault CLI - Command-line interface for SyncVault
//!
//! Provides commands for:
//! - Running a one-off or profile-based sync (with dry-run)
//! - Watching auto-sync profiles and syncing on change
//! - Listing configured profiles
//! - Listing the snapshots kept for a file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    backups::BackupsCommand, profiles::ProfilesCommand, sync::SyncCommand, watch::WatchCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "syncvault",
    version,
    about = "One-way folder sync with versioned backups"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize a profile or an ad-hoc source/destination pair
    Sync(SyncCommand),
    /// Watch auto-sync profiles and sync whenever their sources settle
    Watch(WatchCommand),
    /// List configured profiles
    Profiles(ProfilesCommand),
    /// List the snapshots kept for a file
    Backups(BackupsCommand),
}

/// Sets up `tracing`; `RUST_LOG` wins over `-v`, which wins over the config.
fn init_tracing(verbose: u8, configured_level: &str, json: bool) {
    let level = match verbose {
        0 => configured_level,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref());
    match &config {
        Ok(config) => init_tracing(cli.verbose, &config.logging.level, config.logging.json),
        Err(_) => init_tracing(cli.verbose, "info", false),
    }
    let config = config?;

    let format = OutputFormat::from_json_flag(cli.json);

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Watch(cmd) => cmd.execute(&config, format).await,
        Commands::Profiles(cmd) => cmd.execute(&config, format).await,
        Commands::Backups(cmd) => cmd.execute(&config, format).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ad_hoc_sync() {
        let cli = Cli::try_parse_from([
            "syncvault", "sync", "--source", "/a", "--dest", "/b", "--dry-run", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Sync(cmd) => {
                assert!(cmd.dry_run);
                assert_eq!(cmd.source, Some(PathBuf::from("/a")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sync_needs_profile_or_paths() {
        assert!(Cli::try_parse_from(["syncvault", "sync"]).is_err());
        assert!(Cli::try_parse_from(["syncvault", "sync", "--source", "/a"]).is_err());
        assert!(
            Cli::try_parse_from(["syncvault", "sync", "--profile", "docs", "--source", "/a"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["syncvault", "sync", "--profile", "docs"]).is_ok());
    }

    #[test]
    fn test_parse_backups() {
        let cli = Cli::try_parse_from(["syncvault", "-v", "backups", "docs", "report.txt"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Backups(_)));
    }
}
