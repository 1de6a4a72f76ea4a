//! Configuration module for SyncVault.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! The sync core only ever reads configuration; writing it is the job of
//! whatever front end edits profiles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::SyncProfile;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for SyncVault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub profiles: Vec<SyncProfile>,
}

/// Change monitor and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Milliseconds of filesystem inactivity required before a sync is triggered.
    pub quiet_period_ms: u64,
    /// Seconds between scheduled syncs of auto-sync profiles (0 disables the timer).
    pub schedule_interval_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/syncvault/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("syncvault")
            .join("config.yaml")
    }

    /// Looks up a profile by name.
    pub fn profile(&self, name: &str) -> Option<&SyncProfile> {
        self.profiles.iter().find(|p| p.name() == name)
    }

    /// Profiles that are watched and synced automatically.
    pub fn auto_sync_profiles(&self) -> impl Iterator<Item = &SyncProfile> {
        self.profiles.iter().filter(|p| p.auto_sync())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 2000,
            schedule_interval_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"monitor.quiet_period_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- monitor ---
        if self.monitor.quiet_period_ms == 0 {
            errors.push(ValidationError {
                field: "monitor.quiet_period_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- profiles ---
        let mut seen = HashSet::new();
        for (index, profile) in self.profiles.iter().enumerate() {
            let field = format!("profiles[{index}]");
            if !seen.insert(profile.name()) {
                errors.push(ValidationError {
                    field: format!("{field}.name"),
                    message: format!("duplicate profile name '{}'", profile.name()),
                });
            }
            if let Err(err) = profile.validate() {
                errors.push(ValidationError {
                    field,
                    message: err.to_string(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use syncvault_core::config::ConfigBuilder;
/// use syncvault_core::domain::SyncProfile;
///
/// let config = ConfigBuilder::new()
///     .quiet_period_ms(500)
///     .logging_level("debug")
///     .profile(SyncProfile::new("docs", "/home/me/Docs", "/mnt/usb/Docs").unwrap())
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- monitor ---

    pub fn quiet_period_ms(mut self, ms: u64) -> Self {
        self.config.monitor.quiet_period_ms = ms;
        self
    }

    pub fn schedule_interval_secs(mut self, seconds: u64) -> Self {
        self.config.monitor.schedule_interval_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- profiles ---

    pub fn profile(mut self, profile: SyncProfile) -> Self {
        self.config.profiles.push(profile);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::DEFAULT_RETENTION;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.monitor.quiet_period_ms, 2000);
        assert_eq!(cfg.monitor.schedule_interval_secs, 0);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("syncvault/config.yaml"));
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
monitor:
  quiet_period_ms: 750
  schedule_interval_secs: 600
logging:
  level: debug
profiles:
  - name: docs
    source: /home/user/Documents
    destination: /mnt/backup/Documents
    retention: 5
    auto_sync: true
    exclude:
      - "*.log"
  - name: photos
    source: /home/user/Pictures
    destination: /mnt/backup/Pictures
    backup_root: /mnt/backup/.history/photos
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.monitor.quiet_period_ms, 750);
        assert_eq!(cfg.monitor.schedule_interval_secs, 600);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.profiles.len(), 2);

        let docs = cfg.profile("docs").expect("docs profile");
        assert_eq!(docs.retention(), 5);
        assert!(docs.auto_sync());
        assert_eq!(docs.exclude(), ["*.log".to_string()]);

        let photos = cfg.profile("photos").expect("photos profile");
        assert_eq!(photos.retention(), DEFAULT_RETENTION);
        assert!(!photos.auto_sync());
        assert_eq!(
            photos.effective_backup_root(),
            PathBuf::from("/mnt/backup/.history/photos")
        );

        let auto: Vec<_> = cfg.auto_sync_profiles().map(|p| p.name()).collect();
        assert_eq!(auto, vec!["docs"]);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_partial_yaml_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"logging:\n  level: warn\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.monitor.quiet_period_ms, 2000);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.monitor.quiet_period_ms, 2000);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_quiet_period() {
        let mut cfg = Config::default();
        cfg.monitor.quiet_period_ms = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "monitor.quiet_period_ms"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_catches_duplicate_profile_names() {
        let cfg = ConfigBuilder::new()
            .profile(SyncProfile::new("docs", "/a", "/b").unwrap())
            .profile(SyncProfile::new("docs", "/c", "/d").unwrap())
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "profiles[1].name"));
    }

    #[test]
    fn validate_reports_invalid_profile() {
        let cfg = ConfigBuilder::new()
            .profile(SyncProfile::new("nested", "/data", "/data/copy").unwrap())
            .build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "profiles[0]");
        assert!(errors[0].message.contains("overlap"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = Config::default();
        cfg.monitor.quiet_period_ms = 0;
        cfg.logging.level = "loud".into();
        assert_eq!(cfg.validate().len(), 2);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "monitor.quiet_period_ms".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "monitor.quiet_period_ms: must be greater than 0");
    }

    // -- Builder --

    #[test]
    fn builder_overrides_values() {
        let cfg = ConfigBuilder::new()
            .quiet_period_ms(300)
            .schedule_interval_secs(60)
            .logging_level("trace")
            .logging_json(true)
            .build();
        assert_eq!(cfg.monitor.quiet_period_ms, 300);
        assert_eq!(cfg.monitor.schedule_interval_secs, 60);
        assert_eq!(cfg.logging.level, "trace");
        assert!(cfg.logging.json);
    }

    #[test]
    fn builder_validated_rejects_invalid() {
        let result = ConfigBuilder::new().quiet_period_ms(0).build_validated();
        assert!(result.is_err());

        let result = ConfigBuilder::new().build_validated();
        assert!(result.is_ok());
    }

    #[test]
    fn yaml_roundtrip_keeps_profiles() {
        let cfg = ConfigBuilder::new()
            .profile(
                SyncProfile::new("docs", "/a", "/b")
                    .unwrap()
                    .with_retention(7)
                    .unwrap(),
            )
            .build();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.profiles, cfg.profiles);
    }
}
