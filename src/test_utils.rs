//! Test utilities and fixtures for rip-minder tests.
//!
//! - [`ScriptedRunner`]: a [`ProcessRunner`] replaying canned command output
//! - [`RecordingStatus`]: a [`StatusSink`] that keeps every update
//! - [`RecordingTransfer`]: a [`Transfer`] that records pushes instead of copying
//! - [`mock_entry`] / [`StagedAlbum`]: staging entries, optionally backed by
//!   files on disk
//!
//! # Example
//!
//! ```ignore
//! let runner = ScriptedRunner::new(vec![
//!     Script::new().stdout("drive: /dev/sr0, vendor: X").exit(0),
//! ]);
//! let status = RecordingStatus::default();
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::ripper::{OutputStream, ProcessError, ProcessEvent, ProcessRunner};
use crate::staging::{StagingEntry, Track};
use crate::status::{Status, StatusSink};
use crate::transfer::{Destination, PushRequest, Transfer, TransferError};

/// Canned output of one command run.
#[derive(Debug, Clone, Default)]
pub struct Script {
    lines: Vec<(OutputStream, String)>,
    exit: i32,
    gate: Option<Arc<Notify>>,
    spawn_failure: bool,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, line: &str) -> Self {
        self.lines.push((OutputStream::Stdout, line.to_string()));
        self
    }

    pub fn stdout_lines(mut self, lines: &[&str]) -> Self {
        for line in lines {
            self = self.stdout(line);
        }
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.lines.push((OutputStream::Stderr, line.to_string()));
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.exit = code;
        self
    }

    /// Hold the exit event back until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make the run fail as if the program were not installed.
    pub fn spawn_failure() -> Self {
        Self {
            spawn_failure: true,
            ..Self::default()
        }
    }
}

/// Replays one [`Script`] per run, in order, and records every invocation.
///
/// Runs beyond the scripted ones exit with code 0 and no output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every invocation as `[program, args...]`.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _cwd: Option<&Path>,
    ) -> Result<mpsc::Receiver<ProcessEvent>, ProcessError> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls.lock().push(call);

        let script = self.scripts.lock().pop_front().unwrap_or_default();
        if script.spawn_failure {
            return Err(ProcessError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            });
        }

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for (stream, line) in script.lines {
                if tx.send(ProcessEvent::Line(stream, line)).await.is_err() {
                    return;
                }
            }
            if let Some(gate) = script.gate {
                gate.notified().await;
            }
            let _ = tx.send(ProcessEvent::Exit(script.exit)).await;
        });
        Ok(rx)
    }
}

/// Status sink that records every update.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    statuses: Mutex<Vec<Status>>,
}

impl RecordingStatus {
    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.statuses.lock().iter().map(|s| s.message.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.statuses
            .lock()
            .iter()
            .filter(|s| s.is_error)
            .map(|s| s.message.clone())
            .collect()
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, status: Status) {
        self.statuses.lock().push(status);
    }
}

/// Transfer that records `(artist, album, destination)` per push.
///
/// Pushes succeed unless a failure was queued with [`RecordingTransfer::fail_next`].
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    pushes: Mutex<Vec<(String, String, Destination)>>,
    failure: Mutex<Option<TransferError>>,
}

impl RecordingTransfer {
    pub fn fail_next(&self, error: TransferError) {
        *self.failure.lock() = Some(error);
    }

    pub fn pushes(&self) -> Vec<(String, String, Destination)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl Transfer for RecordingTransfer {
    async fn push(
        &self,
        request: PushRequest<'_>,
        destination: &Destination,
        _status: Arc<dyn StatusSink>,
    ) -> Result<(), TransferError> {
        self.pushes.lock().push((
            request.artist.to_string(),
            request.album.to_string(),
            destination.clone(),
        ));
        match self.failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A staged album entry with the given track file names.
pub fn mock_entry(artist: &str, title: &str, tracks: &[&str]) -> StagingEntry {
    StagingEntry {
        artist: artist.to_string(),
        title: title.to_string(),
        release_type: Some("Album".to_string()),
        duration: Some("42:00".to_string()),
        tracks: tracks.iter().map(|t| Track::new(*t)).collect(),
        staged_at: Some("2024-01-01T00:00:00+00:00".to_string()),
        ..StagingEntry::default()
    }
}

/// A staging entry together with its album directory.
#[derive(Debug, Clone)]
pub struct StagedAlbum {
    pub entry: StagingEntry,
    /// Album directory; set by [`StagedAlbum::write`]
    pub dir: PathBuf,
}

impl StagedAlbum {
    pub fn new(artist: &str, title: &str, tracks: &[&str]) -> Self {
        Self {
            entry: mock_entry(artist, title, tracks),
            dir: PathBuf::new(),
        }
    }

    /// Use on-disk names that differ from the display names.
    pub fn sanitized(mut self, fs_artist: &str, fs_album: &str) -> Self {
        self.entry.fs_artist = Some(fs_artist.to_string());
        self.entry.fs_album = Some(fs_album.to_string());
        self
    }

    /// Create the album directory under `root` with every track and the log.
    pub fn write(mut self, root: &Path) -> Self {
        self.dir = root.join(self.entry.relative_path());
        std::fs::create_dir_all(&self.dir).expect("Failed to create album directory");
        for track in &self.entry.tracks {
            std::fs::write(self.dir.join(&track.file_name), track.file_name.as_bytes())
                .expect("Failed to write track");
        }
        std::fs::write(self.dir.join(self.entry.log_file_name()), b"log")
            .expect("Failed to write log");
        self
    }
}
