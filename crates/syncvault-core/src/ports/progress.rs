//! Progress sink port
//!
//! The engine reports human-readable status lines while it runs. Calls happen
//! on the engine's own execution context; a UI must dispatch them onward.

/// Receives progress lines from a running sync.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}
