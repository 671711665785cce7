//! Log buffer service
//!
//! Collects the log lines of one pipeline run. Lines are mirrored to
//! `tracing` as they are added and drained into the pipeline report when
//! the pipeline finishes.

use slipway_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};

/// Service for managing log buffers
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Drains all log entries from the buffer
    ///
    /// This returns all buffered entries and clears the buffer.
    fn drain(&self) -> Vec<LogEntry>;

    /// Records a message at `level` and emits it as a tracing event
    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.add_entry(LogEntry::now(level, message));
    }
}

/// In-memory implementation of LogBufferService
///
/// Uses Arc<Mutex<Vec<LogEntry>>> for thread-safe access across tasks.
#[derive(Clone)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    /// Creates a new in-memory log buffer
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.drain(..).collect()
    }
}
