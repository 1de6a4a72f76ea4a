//! CLI subcommands
//!
//! Every command loads the configuration through [`load_config`] and prints
//! through an [`OutputFormatter`](crate::output::OutputFormatter).

pub mod backups;
pub mod profiles;
pub mod sync;
pub mod watch;

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use syncvault_core::config::Config;
use syncvault_core::domain::SyncProfile;
use tracing::{debug, info};

/// Loads and validates the configuration.
///
/// An explicit `path` must exist. Without one the default location is used
/// and a missing file yields the default (empty) configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => {
            let path = Config::default_path();
            debug!(config_path = %path.display(), "Loading default configuration");
            if path.exists() {
                Config::load(&path)?
            } else {
                Config::default()
            }
        }
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", details.join("\n  "));
    }

    Ok(config)
}

/// Looks up a configured profile by name.
pub fn find_profile(config: &Config, name: &str) -> Result<SyncProfile> {
    config.profile(name).cloned().ok_or_else(|| {
        let known: Vec<&str> = config.profiles.iter().map(|p| p.name()).collect();
        if known.is_empty() {
            anyhow!("Unknown profile '{name}' (no profiles configured)")
        } else {
            anyhow!("Unknown profile '{name}' (known: {})", known.join(", "))
        }
    })
}
