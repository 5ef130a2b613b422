//! Application-wide error types.
//!
//! This module provides the error type for loading and saving the
//! application's files. Subsystems use specific error types via `thiserror`
//! ([`StagingError`](crate::staging::StagingError),
//! [`TransferError`](crate::transfer::TransferError),
//! [`ProcessError`](crate::ripper::ProcessError)). Ripping and transfer
//! failures become status updates inside the workflow, so only staging
//! errors are converted here. The CLI and `main` use `anyhow`.
//!
//! # Example
//!
//! ```ignore
//! use rip_minder::error::{Result, ResultExt};
//!
//! fn load(path: &Path) -> Result<StagingRepository> {
//!     let json = std::fs::read_to_string(path).with_context("reading staging file")?;
//!     Ok(serde_json::from_str(&json)?)
//! }
//! ```

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Staging file (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Staging area error
    #[error("Staging error: {0}")]
    Staging(#[from] crate::staging::StagingError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serde_json::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Json(e).context(ctx))
    }
}
