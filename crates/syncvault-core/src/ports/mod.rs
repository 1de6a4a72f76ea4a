//! Port definitions
//!
//! Ports are the interfaces the sync core reports through. Their real
//! implementations (activity log files, UI widgets, notifications) live
//! outside the core.
//!
//! ## Ports Overview
//!
//! - [`LogSink`] - Notable events with a level and the owning profile name
//! - [`ProgressSink`] - Human-readable status lines emitted during a run

pub mod log_sink;
pub mod progress;

pub use log_sink::{LogEntry, LogLevel, LogSink, MemoryLogSink};
pub use progress::{NoProgress, ProgressSink};
