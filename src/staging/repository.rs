//! The staging area: ripped albums waiting to be pushed.
//!
//! Entries are keyed by album title. Keys are unique at all times; inserting
//! an entry whose title is already staged replaces the old entry. Operations
//! that touch the filesystem only drop an entry after every file operation
//! for it has succeeded.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use super::entry::StagingEntry;
use super::relocate::{RelocationFailure, relocate_disc, remove_album_dir};

/// Errors from staging area operations.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("No staged album named \"{0}\"")]
    NotFound(String),

    #[error("Multi disk title should differ from original title")]
    TitleUnchanged,

    #[error("\"{0}\" is already staged")]
    TitleTaken(String),

    #[error("Album directory {0} would be shared with the source disc")]
    DirectoryClash(PathBuf),

    #[error("Multi disk album \"{0}\" is still open")]
    MultiDiskPending(String),

    #[error("\"{0}\" is not a multi disk album")]
    NotMultiDisk(String),

    #[error("Cannot append \"{0}\" to itself")]
    SameEntry(String),

    #[error("Moving {path} failed after {moved} track(s): {source}")]
    Relocation {
        moved: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Staging file IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Staging file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Albums staged in an output directory.
#[derive(Debug, Clone)]
pub struct StagingRepository {
    output_dir: PathBuf,
    entries: BTreeMap<String, StagingEntry>,
}

impl StagingRepository {
    /// Empty staging area rooted at `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn with_entries(
        output_dir: impl Into<PathBuf>,
        entries: BTreeMap<String, StagingEntry>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            entries,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn get(&self, key: &str) -> Option<&StagingEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StagingEntry)> {
        self.entries.iter()
    }

    pub(crate) fn entries(&self) -> &BTreeMap<String, StagingEntry> {
        &self.entries
    }

    /// The multi-disc album currently accepting discs, if any.
    pub fn pending_multi_disk(&self) -> Option<&StagingEntry> {
        self.entries.values().find(|e| e.is_multi_disk())
    }

    /// Stage an entry under its title, replacing any entry with that title.
    pub fn insert(&mut self, entry: StagingEntry) -> Option<StagingEntry> {
        let key = entry.key().to_string();
        let previous = self.entries.insert(key.clone(), entry);
        if let Some(prev) = &previous {
            // Same-title re-rips replace silently in the UI; keep a trace of it
            tracing::warn!(
                target: "staging",
                key = %key,
                previous_tracks = prev.tracks.len(),
                "Replaced staged album with the same title"
            );
        }
        previous
    }

    /// Stop tracking an album without touching its files.
    pub fn unstage(&mut self, key: &str) -> Option<StagingEntry> {
        self.entries.remove(key)
    }

    /// Delete an album's files and then forget it.
    ///
    /// Removing a key that is not staged is a no-op.
    pub fn remove(&mut self, key: &str) -> Result<Option<StagingEntry>, StagingError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        let (artist, album) = entry.album_dir();
        remove_album_dir(&self.output_dir, artist, album).map_err(|e| StagingError::Remove {
            path: self.output_dir.join(artist).join(album),
            source: e,
        })?;

        Ok(self.entries.remove(key))
    }

    /// Turn the staged album `source_key` into the first disc of a new
    /// multi-disc album titled `new_title`.
    ///
    /// The source's files move into the new album directory with a `01-`
    /// prefix and the source entry is removed.
    pub fn convert_to_multi(
        &mut self,
        source_key: &str,
        new_title: &str,
    ) -> Result<&StagingEntry, StagingError> {
        let source = self
            .entries
            .get(source_key)
            .ok_or_else(|| StagingError::NotFound(source_key.to_string()))?;

        if new_title == source.title {
            return Err(StagingError::TitleUnchanged);
        }
        if self.entries.contains_key(new_title) {
            return Err(StagingError::TitleTaken(new_title.to_string()));
        }
        // Appends always target the one open multi disk album
        if let Some(pending) = self.pending_multi_disk() {
            return Err(StagingError::MultiDiskPending(pending.title.clone()));
        }

        let multi = StagingEntry {
            title: new_title.to_string(),
            fs_album: Some(new_title.to_string()),
            duration: None,
            tracks: Vec::new(),
            multi_disk_title: Some(new_title.to_string()),
            multi_disk_count: Some(1),
            staged_at: Some(chrono::Utc::now().to_rfc3339()),
            ..source.clone()
        };

        self.merge_disc(source_key, multi)?;
        tracing::info!(target: "staging", source = %source_key, title = %new_title, "Created multi disk album");
        self.get(new_title)
            .ok_or_else(|| StagingError::NotFound(new_title.to_string()))
    }

    /// Append the staged album `source_key` as the next disc of the
    /// multi-disc album `target_title`.
    pub fn append_to_multi(
        &mut self,
        source_key: &str,
        target_title: &str,
    ) -> Result<&StagingEntry, StagingError> {
        if source_key == target_title {
            return Err(StagingError::SameEntry(source_key.to_string()));
        }
        if !self.entries.contains_key(source_key) {
            return Err(StagingError::NotFound(source_key.to_string()));
        }
        let mut target = self
            .entries
            .get(target_title)
            .cloned()
            .ok_or_else(|| StagingError::NotFound(target_title.to_string()))?;
        let count = target
            .multi_disk_count
            .ok_or_else(|| StagingError::NotMultiDisk(target_title.to_string()))?;

        target.multi_disk_count = Some(count + 1);

        self.merge_disc(source_key, target)?;
        tracing::info!(target: "staging", source = %source_key, title = %target_title, disc = count + 1, "Extended multi disk album");
        self.get(target_title)
            .ok_or_else(|| StagingError::NotFound(target_title.to_string()))
    }

    /// Move the files of `source_key` into `multi` as disc
    /// `multi.multi_disk_count`, stage `multi` and remove the source.
    fn merge_disc(&mut self, source_key: &str, mut multi: StagingEntry) -> Result<(), StagingError> {
        let source = self
            .entries
            .get(source_key)
            .ok_or_else(|| StagingError::NotFound(source_key.to_string()))?;
        let disk_index = multi.multi_disk_count.unwrap_or(1);

        let src_dir = self.output_dir.join(source.relative_path());
        let dest_dir = self.output_dir.join(multi.relative_path());
        if src_dir == dest_dir {
            return Err(StagingError::DirectoryClash(dest_dir));
        }

        let result = relocate_disc(
            &source.tracks,
            disk_index,
            &src_dir,
            &dest_dir,
            &source.log_file_name(),
        );

        match result {
            Ok(moved) => {
                multi.tracks.extend(moved);
                self.entries.insert(multi.title.clone(), multi);
                self.remove(source_key)?;
                Ok(())
            }
            Err(RelocationFailure {
                moved,
                path,
                source,
            }) => {
                let count = moved.len();
                // Keep what already moved addressable; the source stays for manual recovery
                if count > 0 {
                    multi.tracks.extend(moved);
                    self.entries.insert(multi.title.clone(), multi);
                }
                tracing::error!(target: "staging", path = %path.display(), moved = count, error = %source, "Disc relocation aborted");
                Err(StagingError::Relocation {
                    moved: count,
                    path,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::Track;
    use crate::test_utils::{StagedAlbum, mock_entry};
    use tempfile::tempdir;

    #[test]
    fn test_insert_overwrites_same_title() {
        let mut repo = StagingRepository::new("/nonexistent");
        assert!(repo.insert(mock_entry("Artist", "Album", &["01.flac"])).is_none());
        let previous = repo.insert(mock_entry("Artist", "Album", &["01.flac", "02.flac"]));

        assert_eq!(previous.unwrap().tracks.len(), 1);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("Album").unwrap().tracks.len(), 2);
    }

    #[test]
    fn test_unstage_keeps_files() {
        let temp = tempdir().unwrap();
        let album = StagedAlbum::new("Artist", "Album", &["01.flac"]).write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        assert!(repo.unstage("Album").is_some());
        assert!(repo.is_empty());
        assert!(album.dir.join("01.flac").exists());
    }

    #[test]
    fn test_remove_deletes_files_and_entry() {
        let temp = tempdir().unwrap();
        let album = StagedAlbum::new("Artist", "Album", &["01.flac"]).write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        let removed = repo.remove("Album").unwrap();
        assert!(removed.is_some());
        assert!(!repo.contains("Album"));
        assert!(!temp.path().join("Artist").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_failure_keeps_entry() {
        let temp = tempdir().unwrap();
        // A regular file where the album directory should be
        std::fs::create_dir_all(temp.path().join("Artist")).unwrap();
        std::fs::write(temp.path().join("Artist").join("Album"), b"not a dir").unwrap();
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(mock_entry("Artist", "Album", &["01.flac"]));

        let err = repo.remove("Album").unwrap_err();
        assert!(matches!(err, StagingError::Remove { .. }));
        assert!(repo.contains("Album"));
        assert!(temp.path().join("Artist").join("Album").is_file());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let temp = tempdir().unwrap();
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(mock_entry("Artist", "Album", &[]));

        assert!(repo.remove("Missing").unwrap().is_none());
        assert!(repo.remove("Missing").unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_remove_uses_sanitized_directory() {
        let temp = tempdir().unwrap();
        let album = StagedAlbum::new("AC/DC", "Back: In Black", &["01.flac"])
            .sanitized("AC_DC", "Back_ In Black")
            .write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        repo.remove("Back: In Black").unwrap();
        assert!(!temp.path().join("AC_DC").exists());
    }

    #[test]
    fn test_convert_then_append() {
        let temp = tempdir().unwrap();
        let a = StagedAlbum::new("Band", "Live (Disc 1)", &["01. One.flac", "02. Two.flac"])
            .write(temp.path());
        let b = StagedAlbum::new("Band", "Live (Disc 2)", &["01. Three.flac"]).write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(a.entry.clone());
        repo.insert(b.entry.clone());

        let multi = repo.convert_to_multi("Live (Disc 1)", "Live").unwrap();
        assert_eq!(multi.multi_disk_count, Some(1));
        assert_eq!(multi.multi_disk_title.as_deref(), Some("Live"));
        assert_eq!(multi.duration, None);

        let multi = repo.append_to_multi("Live (Disc 2)", "Live").unwrap();
        let names: Vec<&str> = multi.tracks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["01-01. One.flac", "01-02. Two.flac", "02-01. Three.flac"]
        );
        assert_eq!(multi.multi_disk_count, Some(2));

        assert!(!repo.contains("Live (Disc 1)"));
        assert!(!repo.contains("Live (Disc 2)"));
        assert_eq!(repo.len(), 1);

        let dest = temp.path().join("Band").join("Live");
        assert!(dest.join("01-02. Two.flac").exists());
        assert!(dest.join("02-01. Three.flac").exists());
        assert!(dest.join("Band - Live (Disc 1).log").exists());
        assert!(dest.join("Band - Live (Disc 2).log").exists());
        assert!(!temp.path().join("Band").join("Live (Disc 1)").exists());
    }

    #[test]
    fn test_convert_keeps_confidence_annotation() {
        let temp = tempdir().unwrap();
        let mut album = StagedAlbum::new("Band", "Disc", &["01.flac"]);
        album.entry.tracks[0].confidence = Some("confidence 7".to_string());
        let album = album.write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        let multi = repo.convert_to_multi("Disc", "Box").unwrap();
        assert_eq!(
            multi.tracks[0],
            Track {
                file_name: "01-01.flac".to_string(),
                confidence: Some("confidence 7".to_string()),
            }
        );
    }

    #[test]
    fn test_convert_rejects_unchanged_title() {
        let temp = tempdir().unwrap();
        let album = StagedAlbum::new("Band", "Disc", &["01.flac"]).write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        let err = repo.convert_to_multi("Disc", "Disc").unwrap_err();
        assert!(matches!(err, StagingError::TitleUnchanged));
        assert_eq!(repo.get("Disc"), Some(&album.entry));
        assert_eq!(repo.len(), 1);
        assert!(album.dir.join("01.flac").exists());
    }

    #[test]
    fn test_convert_rejects_taken_title() {
        let mut repo = StagingRepository::new("/nonexistent");
        repo.insert(mock_entry("Band", "Disc", &[]));
        repo.insert(mock_entry("Band", "Other", &[]));

        let err = repo.convert_to_multi("Disc", "Other").unwrap_err();
        assert!(matches!(err, StagingError::TitleTaken(_)));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_append_requires_multi_disk_target() {
        let mut repo = StagingRepository::new("/nonexistent");
        repo.insert(mock_entry("Band", "One", &[]));
        repo.insert(mock_entry("Band", "Two", &[]));

        assert!(matches!(
            repo.append_to_multi("Two", "One").unwrap_err(),
            StagingError::NotMultiDisk(_)
        ));
        assert!(matches!(
            repo.append_to_multi("Two", "Two").unwrap_err(),
            StagingError::SameEntry(_)
        ));
        assert!(matches!(
            repo.append_to_multi("Three", "One").unwrap_err(),
            StagingError::NotFound(_)
        ));
    }

    #[test]
    fn test_partial_relocation_keeps_source() {
        let temp = tempdir().unwrap();
        let album = StagedAlbum::new("Band", "Disc", &["01.flac", "02.flac"]).write(temp.path());
        std::fs::remove_file(album.dir.join("02.flac")).unwrap();
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(album.entry.clone());

        let err = repo.convert_to_multi("Disc", "Box").unwrap_err();
        assert!(matches!(err, StagingError::Relocation { moved: 1, .. }));
        assert!(repo.contains("Disc"));
        assert_eq!(repo.get("Box").unwrap().tracks.len(), 1);
    }

    #[test]
    fn test_second_multi_disk_is_refused() {
        let temp = tempdir().unwrap();
        let first = StagedAlbum::new("Band", "A", &["01.flac"]).write(temp.path());
        let second = StagedAlbum::new("Band", "B", &["01.flac"]).write(temp.path());
        let mut repo = StagingRepository::new(temp.path());
        repo.insert(first.entry.clone());
        repo.insert(second.entry.clone());

        repo.convert_to_multi("A", "Zeta").unwrap();
        let err = repo.convert_to_multi("B", "Alpha").unwrap_err();
        assert!(matches!(err, StagingError::MultiDiskPending(ref title) if title == "Zeta"));
        assert!(repo.contains("B"));
        assert!(second.dir.join("01.flac").exists());
    }

    #[test]
    fn test_pending_multi_disk() {
        let mut repo = StagingRepository::new("/nonexistent");
        repo.insert(mock_entry("Band", "Single", &[]));
        assert!(repo.pending_multi_disk().is_none());

        let mut multi = mock_entry("Band", "Box", &[]);
        multi.multi_disk_title = Some("Box".to_string());
        multi.multi_disk_count = Some(1);
        repo.insert(multi);
        assert_eq!(repo.pending_multi_disk().unwrap().title, "Box");
    }
}
