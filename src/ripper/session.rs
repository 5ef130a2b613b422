//! Accumulating one rip's metadata from its output.
//!
//! A [`RipSession`] lives exactly as long as one rip subprocess. Both output
//! streams feed the same session; since their relative order is not
//! guaranteed, every step that depends on a pending track flushes it first
//! instead of assuming another line already did.

use std::collections::BTreeMap;

use super::event::{
    ReleasePhase, RipEvent, Severity, StdoutContext, classify_stderr, classify_stdout,
};
use crate::staging::{StagingEntry, Track};
use crate::status::Status;

/// In-progress state of one rip.
#[derive(Debug, Default)]
pub struct RipSession {
    release_phase: ReleasePhase,
    release: BTreeMap<String, String>,
    fs_path: Option<(String, String)>,
    current_track: Option<String>,
    tracks: Vec<Track>,
    /// Index of the next track to annotate while inside the accuracy block
    accuracy_index: Option<usize>,
}

impl RipSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stdout line.
    pub fn stdout_line(&mut self, line: &str) -> Option<Status> {
        let event = classify_stdout(line, self.stdout_context());
        self.apply(event)
    }

    /// Feed one stderr line.
    pub fn stderr_line(&mut self, line: &str) -> Option<Status> {
        self.apply(classify_stderr(line))
    }

    fn stdout_context(&self) -> StdoutContext {
        StdoutContext {
            release: self.release_phase,
            in_accuracy_block: self.accuracy_index.is_some(),
        }
    }

    /// Fold one event into the session.
    ///
    /// Returns the status update the event warrants, if any.
    pub fn apply(&mut self, event: RipEvent) -> Option<Status> {
        match event {
            RipEvent::ReleaseMarker => {
                if self.release_phase == ReleasePhase::Waiting {
                    self.release_phase = ReleasePhase::AwaitHeader;
                }
                None
            }
            RipEvent::ReleaseHeader => {
                if self.release_phase == ReleasePhase::AwaitHeader {
                    self.release_phase = ReleasePhase::SkipList;
                }
                None
            }
            RipEvent::ReleaseField { key, value } => {
                if self.release_phase == ReleasePhase::Fields {
                    self.release.insert(key, value);
                }
                None
            }
            RipEvent::Blank => {
                match self.release_phase {
                    ReleasePhase::SkipList => self.release_phase = ReleasePhase::Fields,
                    ReleasePhase::Fields => {
                        self.release_phase = ReleasePhase::Done;
                        tracing::info!(target: "ripper::rip", fields = self.release.len(), title = ?self.title(), "Release metadata found");
                    }
                    _ => self.accuracy_index = None,
                }
                None
            }
            RipEvent::AlreadyRipped => Some(self.decorate(Status::info("Already staged"))),
            RipEvent::Progress(progress) => self
                .current_track
                .as_ref()
                .map(|track| format!("{} ({})", track, progress))
                .map(|message| self.decorate(Status::info(message))),
            RipEvent::AccuracyStart { confidence } => {
                self.flush_track();
                self.accuracy_index = Some(0);
                if let Some(confidence) = confidence {
                    self.annotate(confidence);
                }
                None
            }
            RipEvent::Confidence(confidence) => {
                self.annotate(confidence);
                None
            }
            RipEvent::TrackStart(name) => {
                if self.current_track.as_deref() != Some(name.as_str()) {
                    self.flush_track();
                    tracing::info!(target: "ripper::rip", track = %name, "Ripping track");
                    self.current_track = Some(name);
                }
                None
            }
            RipEvent::TrackEnd => {
                self.flush_track();
                None
            }
            RipEvent::CuePath { artist, album } => {
                tracing::debug!(target: "ripper::rip", %artist, %album, "Output path reported");
                self.fs_path = Some((artist, album));
                None
            }
            RipEvent::Severity { severity, message } => match severity {
                Severity::Critical | Severity::Error => Some(Status::error(message)),
                Severity::Warning | Severity::Info if !message.is_empty() => {
                    Some(self.decorate(Status::info(message)))
                }
                _ => None,
            },
            RipEvent::Malformed(line) => {
                tracing::warn!(target: "ripper::rip", line = %line, "Skipping unexpected output line");
                None
            }
            RipEvent::Text(_) => None,
        }
    }

    /// Prefix a status with the release being ripped, once it is known.
    pub fn decorate(&self, status: Status) -> Status {
        match self.title() {
            Some(title) => Status {
                message: format!(
                    "{}: {} - {}\n{}",
                    self.release.get("Type").map(String::as_str).unwrap_or("Release"),
                    self.release.get("Artist").map(String::as_str).unwrap_or_default(),
                    title,
                    status.message
                ),
                is_error: status.is_error,
            },
            None => status,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.release.get("Title").map(String::as_str)
    }

    pub fn release(&self) -> &BTreeMap<String, String> {
        &self.release
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current_track.as_deref()
    }

    fn flush_track(&mut self) {
        if let Some(name) = self.current_track.take() {
            self.tracks.push(Track::new(name));
        }
    }

    fn annotate(&mut self, confidence: String) {
        let Some(index) = self.accuracy_index else {
            return;
        };
        match self.tracks.get_mut(index) {
            Some(track) => track.confidence = Some(confidence),
            None => {
                tracing::warn!(target: "ripper::rip", index, tracks = self.tracks.len(), "Confidence line without a matching track");
            }
        }
        self.accuracy_index = Some(index + 1);
    }

    /// Close the session after a successful exit.
    ///
    /// Returns the entry to stage, or `None` when no release was identified.
    pub fn finish(mut self) -> Option<StagingEntry> {
        self.flush_track();
        self.title()?;

        let mut entry = StagingEntry::from_release(self.release);
        if let Some((artist, album)) = self.fs_path {
            entry.fs_artist = Some(artist);
            entry.fs_album = Some(album);
        }
        entry.tracks = self.tracks;
        entry.staged_at = Some(chrono::Utc::now().to_rfc3339());
        Some(entry)
    }
}
