//! Pushing staged albums to their destination.
//!
//! A destination is either a local directory (`/music`, `~/Music`) or an
//! SMB share (`//nas/music[/sub/path]`). Only the album's audio files and
//! rip log are transferred, into `<destination>/<artist>/<album>`.

mod local;
mod smb;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::ripper::{ProcessError, ProcessRunner};
use crate::status::StatusSink;

pub use local::{is_transferable, push_local};
pub use smb::smb_args;

/// Errors from pushing an album.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Please specify an absolute path or SMB share")]
    InvalidShare(String),

    #[error("Please setup Share in Global Settings")]
    NotConfigured,

    /// The album directory is gone from the staging area
    #[error("Album not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Copy failed: {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote copy failed (exit code {0})")]
    Remote(i32),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Copy task failed: {0}")]
    Task(String),
}

/// Where pushed albums go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local(PathBuf),
    Smb {
        /// `//host/share`
        share: String,
        /// Directory inside the share
        path: Option<String>,
        user: String,
        password: Option<String>,
    },
}

impl Destination {
    /// Interpret the configured share.
    pub fn parse(
        share: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, TransferError> {
        let share = share
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(TransferError::NotConfigured)?;

        if share.starts_with("//") {
            let user = user
                .filter(|u| !u.is_empty())
                .ok_or(TransferError::NotConfigured)?;
            // "//host/share" plus an optional path inside the share
            let fields: Vec<&str> = share.split('/').collect();
            let (root, rest) = fields.split_at(fields.len().min(4));
            let path = rest.join("/");
            return Ok(Destination::Smb {
                share: root.join("/"),
                path: (!path.is_empty()).then_some(path),
                user: user.to_string(),
                password: password.filter(|p| !p.is_empty()).map(str::to_string),
            });
        }

        if let Some(rest) = share.strip_prefix('~') {
            let home = dirs::home_dir().ok_or_else(|| TransferError::InvalidShare(share.into()))?;
            return Ok(Destination::Local(home.join(rest.trim_start_matches('/'))));
        }

        if share.starts_with('/') {
            return Ok(Destination::Local(PathBuf::from(share)));
        }

        Err(TransferError::InvalidShare(share.to_string()))
    }
}

/// Share settings as entered by the user; any field may be missing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ShareCredentials {
    pub share: Option<String>,
    pub user: Option<String>,
    /// Never persisted
    pub password: Option<String>,
}

impl ShareCredentials {
    /// Fill the missing fields from `fallback`.
    pub fn or(self, fallback: &ShareCredentials) -> Self {
        Self {
            share: self.share.or_else(|| fallback.share.clone()),
            user: self.user.or_else(|| fallback.user.clone()),
            password: self.password.or_else(|| fallback.password.clone()),
        }
    }

    pub fn destination(&self) -> Result<Destination, TransferError> {
        Destination::parse(
            self.share.as_deref(),
            self.user.as_deref(),
            self.password.as_deref(),
        )
    }
}

impl std::fmt::Debug for ShareCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareCredentials")
            .field("share", &self.share)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The album to push, addressed by its on-disk names.
#[derive(Debug, Clone, Copy)]
pub struct PushRequest<'a> {
    pub output_dir: &'a Path,
    pub artist: &'a str,
    pub album: &'a str,
}

impl PushRequest<'_> {
    pub fn relative_path(&self) -> PathBuf {
        Path::new(self.artist).join(self.album)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.output_dir.join(self.relative_path())
    }
}

/// Delivers an album to a destination.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn push(
        &self,
        request: PushRequest<'_>,
        destination: &Destination,
        status: Arc<dyn StatusSink>,
    ) -> Result<(), TransferError>;
}

/// Local copy or SMB client, depending on the destination.
pub struct ShareTransfer {
    runner: Arc<dyn ProcessRunner>,
    smb_command: String,
}

impl ShareTransfer {
    pub fn new(runner: Arc<dyn ProcessRunner>, smb_command: impl Into<String>) -> Self {
        Self {
            runner,
            smb_command: smb_command.into(),
        }
    }
}

#[async_trait]
impl Transfer for ShareTransfer {
    async fn push(
        &self,
        request: PushRequest<'_>,
        destination: &Destination,
        status: Arc<dyn StatusSink>,
    ) -> Result<(), TransferError> {
        match destination {
            Destination::Local(root) => {
                let src = request.source_dir();
                let dest = root.join(request.relative_path());
                let copied = tokio::task::spawn_blocking(move || push_local(&src, &dest, &*status))
                    .await
                    .map_err(|e| TransferError::Task(e.to_string()))??;
                tracing::info!(target: "transfer", files = copied, "Local push complete");
                Ok(())
            }
            Destination::Smb { .. } => {
                smb::push_smb(
                    self.runner.as_ref(),
                    &self.smb_command,
                    request,
                    destination,
                    status.as_ref(),
                )
                .await
            }
        }
    }
}
