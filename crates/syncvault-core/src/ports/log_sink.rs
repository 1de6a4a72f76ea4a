//! Log sink port (driven/secondary port)
//!
//! The sync core calls a [`LogSink`] for every notable event: run start and
//! end, backup failures, rotation failures, per-file sync failures. It never
//! reads logs back.
//!
//! ## Design Notes
//!
//! - Logging is fire-and-forget and infallible from the caller's view; sinks
//!   that persist entries must swallow their own I/O errors.
//! - Every entry carries the profile name so one sink can serve many profiles.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    /// A run or operation finished successfully.
    Success,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        };
        write!(f, "{}", s)
    }
}

/// Receives notable events from the sync core.
pub trait LogSink: Send + Sync {
    /// Records one event for the given profile.
    fn log(&self, level: LogLevel, message: &str, profile: &str);
}

/// A single recorded log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub profile: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory log sink.
///
/// Keeps every entry it receives. Useful for UIs that display the activity
/// of the current session, and for tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Returns the messages recorded at the given level.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, message: &str, profile: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                message: message.to_string(),
                profile: profile.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}
