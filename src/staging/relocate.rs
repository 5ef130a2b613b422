//! Moving a disc's files into a multi-disc album directory.
//!
//! Each track file is renamed with a disc prefix (`01-`, `02-`, ...) so
//! discs with identical track numbering can share one directory. Moves are
//! applied strictly in track order and stop at the first failure; files
//! already moved stay where they are.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::entry::Track;

/// Prefix a file name with its disc index.
pub fn disc_prefixed(disk_index: u32, name: &str) -> String {
    format!("{:02}-{}", disk_index, name)
}

/// Outcome of a relocation that stopped part way.
#[derive(Debug)]
pub struct RelocationFailure {
    /// Tracks moved before the failure, already renamed
    pub moved: Vec<Track>,
    /// The file that could not be moved
    pub path: PathBuf,
    pub source: io::Error,
}

/// Move `tracks` from `src_dir` to `dest_dir` under disc index `disk_index`,
/// followed by the rip log `log_file` (which keeps its name).
///
/// Returns the renamed tracks in their original order.
pub fn relocate_disc(
    tracks: &[Track],
    disk_index: u32,
    src_dir: &Path,
    dest_dir: &Path,
    log_file: &str,
) -> Result<Vec<Track>, RelocationFailure> {
    fs::create_dir_all(dest_dir).map_err(|e| RelocationFailure {
        moved: Vec::new(),
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    let mut moved = Vec::with_capacity(tracks.len());
    for track in tracks {
        let renamed = track.renamed(disc_prefixed(disk_index, &track.file_name));
        let from = src_dir.join(&track.file_name);
        let to = dest_dir.join(&renamed.file_name);

        if let Err(e) = move_file(&from, &to) {
            return Err(RelocationFailure {
                moved,
                path: from,
                source: e,
            });
        }
        tracing::debug!(target: "staging", from = %from.display(), to = %to.display(), "Moved track");
        moved.push(renamed);
    }

    let from = src_dir.join(log_file);
    match move_file(&from, &dest_dir.join(log_file)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(target: "staging", log = %from.display(), "Rip log not found, skipping");
        }
        Err(e) => {
            return Err(RelocationFailure {
                moved,
                path: from,
                source: e,
            });
        }
    }

    Ok(moved)
}

/// Rename a file, falling back to copy + delete across devices.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if !from.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", from.display()),
        ));
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Delete an album directory tree and prune its artist directory if now empty.
///
/// A missing album directory or a missing / non-empty artist directory is
/// expected; any other failure is returned.
pub fn remove_album_dir(output_dir: &Path, artist: &str, album: &str) -> io::Result<()> {
    let artist_dir = output_dir.join(artist);
    let album_dir = artist_dir.join(album);

    tracing::info!(target: "staging", path = %album_dir.display(), "Deleting album directory");
    match fs::remove_dir_all(&album_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    match fs::remove_dir(&artist_dir) {
        Ok(()) => Ok(()),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
            ) =>
        {
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disc_prefixed() {
        assert_eq!(disc_prefixed(1, "01. Intro.flac"), "01-01. Intro.flac");
        assert_eq!(disc_prefixed(2, "01. Intro.flac"), "02-01. Intro.flac");
        assert_eq!(disc_prefixed(12, "x.flac"), "12-x.flac");
    }

    #[test]
    fn test_relocate_disc_moves_tracks_and_log_in_order() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("Artist").join("Disc 1");
        let dest = temp.path().join("Artist").join("Box Set");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("01. A.flac"), b"a").unwrap();
        fs::write(src.join("02. B.flac"), b"b").unwrap();
        fs::write(src.join("Artist - Disc 1.log"), b"log").unwrap();

        let tracks = vec![
            Track {
                file_name: "01. A.flac".to_string(),
                confidence: Some("confidence 3".to_string()),
            },
            Track::new("02. B.flac"),
        ];

        let moved = relocate_disc(&tracks, 1, &src, &dest, "Artist - Disc 1.log").unwrap();

        assert_eq!(moved[0].file_name, "01-01. A.flac");
        assert_eq!(moved[0].confidence.as_deref(), Some("confidence 3"));
        assert_eq!(moved[1].file_name, "01-02. B.flac");
        assert_eq!(fs::read(dest.join("01-01. A.flac")).unwrap(), b"a");
        assert!(dest.join("01-02. B.flac").exists());
        assert!(dest.join("Artist - Disc 1.log").exists());
        assert!(!src.join("01. A.flac").exists());
    }

    #[test]
    fn test_relocate_disc_stops_at_first_missing_track() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("01.flac"), b"1").unwrap();
        fs::write(src.join("03.flac"), b"3").unwrap();

        let tracks = vec![
            Track::new("01.flac"),
            Track::new("02.flac"),
            Track::new("03.flac"),
        ];

        let failure = relocate_disc(&tracks, 2, &src, &dest, "none.log").unwrap_err();
        assert_eq!(failure.moved.len(), 1);
        assert_eq!(failure.moved[0].file_name, "02-01.flac");
        assert!(failure.path.ends_with("02.flac"));
        // No rollback, and nothing after the failure is touched
        assert!(dest.join("02-01.flac").exists());
        assert!(src.join("03.flac").exists());
    }

    #[test]
    fn test_relocate_disc_tolerates_missing_log() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("01.flac"), b"1").unwrap();

        let moved =
            relocate_disc(&[Track::new("01.flac")], 1, &src, &temp.path().join("dest"), "x.log")
                .unwrap();
        assert_eq!(moved.len(), 1);
    }

    #[test]
    fn test_remove_album_dir_prunes_empty_artist() {
        let temp = tempdir().unwrap();
        let album = temp.path().join("Artist").join("Album");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("01.flac"), b"1").unwrap();

        remove_album_dir(temp.path(), "Artist", "Album").unwrap();
        assert!(!temp.path().join("Artist").exists());
    }

    #[test]
    fn test_remove_album_dir_keeps_artist_with_other_albums() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Artist").join("Album")).unwrap();
        fs::create_dir_all(temp.path().join("Artist").join("Other")).unwrap();

        remove_album_dir(temp.path(), "Artist", "Album").unwrap();
        assert!(temp.path().join("Artist").join("Other").exists());
        assert!(!temp.path().join("Artist").join("Album").exists());
    }

    #[test]
    fn test_remove_album_dir_missing_is_not_an_error() {
        let temp = tempdir().unwrap();
        remove_album_dir(temp.path(), "Nobody", "Nothing").unwrap();
    }
}
