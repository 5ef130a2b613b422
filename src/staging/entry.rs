//! Staged album records.
//!
//! A [`StagingEntry`] is one ripped (or merged) album waiting to be pushed.
//! The JSON layout keeps the field names the ripping tool reports
//! (`Artist`, `Title`, `Type`, `Duration`) so staging files written by older
//! releases load unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension of the audio files the ripping tool writes.
pub const AUDIO_EXTENSION: &str = ".flac";

/// One ripped track: its file name plus the accuracy annotation, if any.
///
/// Persisted as its display string, e.g. `"01. Artist - Song.flac (confidence 12)"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Track {
    /// File name inside the album directory
    pub file_name: String,
    /// Accuracy confidence reported after the rip
    pub confidence: Option<String>,
}

impl Track {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            confidence: None,
        }
    }

    /// Same track under a different file name, keeping the confidence.
    pub fn renamed(&self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            confidence: self.confidence.clone(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.confidence {
            Some(confidence) => write!(f, "{} ({})", self.file_name, confidence),
            None => f.write_str(&self.file_name),
        }
    }
}

impl From<String> for Track {
    fn from(s: String) -> Self {
        // The annotation follows the audio extension: "<name>.flac (<confidence>)"
        if let Some(pos) = s.find(AUDIO_EXTENSION) {
            let end = pos + AUDIO_EXTENSION.len();
            let rest = s[end..].trim();
            let confidence = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .map(str::to_string);
            if rest.is_empty() || confidence.is_some() {
                return Self {
                    file_name: s[..end].to_string(),
                    confidence,
                };
            }
        }
        Self::new(s)
    }
}

impl From<Track> for String {
    fn from(track: Track) -> Self {
        track.to_string()
    }
}

/// A ripped album held in the staging area.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StagingEntry {
    #[serde(rename = "Artist", default)]
    pub artist: String,

    #[serde(rename = "Title", default)]
    pub title: String,

    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,

    #[serde(rename = "Duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Artist directory name as written by the ripping tool (sanitized)
    #[serde(rename = "fs_artist", default, skip_serializing_if = "Option::is_none")]
    pub fs_artist: Option<String>,

    /// Album directory name as written by the ripping tool (sanitized)
    #[serde(rename = "fs_album", default, skip_serializing_if = "Option::is_none")]
    pub fs_album: Option<String>,

    /// Tracks in rip order; matches the on-disk file order
    #[serde(default)]
    pub tracks: Vec<Track>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_disk_title: Option<String>,

    /// Number of discs merged into this entry so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_disk_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_at: Option<String>,

    /// Remaining release fields (URL, Release, Cat no, Barcode, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl StagingEntry {
    /// Build an entry from the release fields of a disc identification.
    ///
    /// `Artist`, `Title`, `Type` and `Duration` become typed fields; every
    /// other key is kept verbatim.
    pub fn from_release(mut fields: BTreeMap<String, String>) -> Self {
        Self {
            artist: fields.remove("Artist").unwrap_or_default(),
            title: fields.remove("Title").unwrap_or_default(),
            release_type: fields.remove("Type"),
            duration: fields.remove("Duration"),
            extra: fields,
            ..Self::default()
        }
    }

    /// Staging key of this entry.
    pub fn key(&self) -> &str {
        &self.title
    }

    /// `(artist_dir, album_dir)` as they exist on disk.
    ///
    /// The sanitized pair wins when the ripping tool reported one.
    pub fn album_dir(&self) -> (&str, &str) {
        match (&self.fs_artist, &self.fs_album) {
            (Some(artist), Some(album)) => (artist, album),
            _ => (&self.artist, &self.title),
        }
    }

    /// Album path relative to the output directory.
    pub fn relative_path(&self) -> std::path::PathBuf {
        let (artist, album) = self.album_dir();
        std::path::Path::new(artist).join(album)
    }

    /// File name of the rip log inside the album directory.
    pub fn log_file_name(&self) -> String {
        let (artist, album) = self.album_dir();
        format!("{} - {}.log", artist, album)
    }

    /// Whether this entry is a multi-disc album still accepting discs.
    pub fn is_multi_disk(&self) -> bool {
        self.multi_disk_count.is_some()
    }

    /// One-line description used in status messages and listings.
    pub fn describe(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}
