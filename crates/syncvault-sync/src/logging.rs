//! `tracing`-backed log sink
//!
//! Routes [`LogSink`] entries into the process-wide `tracing` subscriber so
//! the CLI (or a daemon) gets activity logging without a dedicated log file.

use syncvault_core::ports::{LogLevel, LogSink};
use tracing::{error, info, warn};

/// Log sink that forwards every entry to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str, profile: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        match level {
            LogLevel::Info => info!(profile, %timestamp, "{message}"),
            LogLevel::Success => info!(profile, %timestamp, outcome = "success", "{message}"),
            LogLevel::Warning => warn!(profile, %timestamp, "{message}"),
            LogLevel::Error => error!(profile, %timestamp, "{message}"),
        }
    }
}
