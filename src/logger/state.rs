//! Capture/file lifecycle flags shared between interrupt and main-loop contexts.
//!
//! Each flag has exactly one writer:
//! - `running` is written only by the logging control state machine
//! - `file_open` is written only by the storage consumer
//!
//! Readers tolerate a value that is one tick or one loop iteration stale.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared running / file-open flags.
#[derive(Debug, Default)]
pub struct RunningState {
    running: AtomicBool,
    file_open: AtomicBool,
}

impl RunningState {
    /// Both flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Writer: logging control only.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// The data file is open.
    pub fn is_file_open(&self) -> bool {
        self.file_open.load(Ordering::Acquire)
    }

    /// Writer: storage consumer only.
    pub fn set_file_open(&self, open: bool) {
        self.file_open.store(open, Ordering::Release);
    }
}
