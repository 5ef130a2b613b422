//! User-facing status reporting.
//!
//! Every step posts human-readable status text when it starts, on notable
//! sub-events and when it finishes. A [`StatusSink`] decides where that text
//! goes; [`LogStatus`] writes it to the log and to stdout.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// A status message, flagged when it reports a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub message: String,
    pub is_error: bool,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Receiver of status updates.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: Status);

    fn info(&self, message: &str) {
        self.set_status(Status::info(message));
    }

    fn error(&self, message: &str) {
        self.set_status(Status::error(message));
    }
}

/// Forwards updates to another sink and remembers the latest one.
pub struct TrackedStatus {
    inner: Arc<dyn StatusSink>,
    last: Mutex<Option<Status>>,
}

impl TrackedStatus {
    pub fn new(inner: Arc<dyn StatusSink>) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    pub fn last(&self) -> Option<Status> {
        self.last.lock().clone()
    }
}

impl StatusSink for TrackedStatus {
    fn set_status(&self, status: Status) {
        *self.last.lock() = Some(status.clone());
        self.inner.set_status(status);
    }
}

/// Status sink that logs every update and echoes it to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus {
    /// Suppress the stdout echo (log only)
    pub quiet: bool,
}

impl StatusSink for LogStatus {
    fn set_status(&self, status: Status) {
        if status.is_error {
            tracing::warn!(target: "status", "{}", status.message);
        } else {
            tracing::info!(target: "status", "{}", status.message);
        }
        if !self.quiet {
            let marker = if status.is_error { "!" } else { "*" };
            println!("{} {}", marker, status.message.replace('\n', "\n  "));
        }
    }
}
