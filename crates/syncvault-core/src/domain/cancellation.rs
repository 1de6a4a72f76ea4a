//! Cooperative cancellation for in-flight sync runs

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared flag used to ask a running sync to stop.
///
/// Clones share the same flag. The engine polls it once per file, so a copy
/// that has already started always completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
