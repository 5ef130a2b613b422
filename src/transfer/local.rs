//! Copying an album to a local (or mounted) directory.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::TransferError;
use crate::status::StatusSink;

/// Whether a file belongs in a push: audio files and rip logs only.
pub fn is_transferable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "flac" | "log"))
        .unwrap_or(false)
}

/// Copy the transferable files under `src` to the same layout under `dest`,
/// overwriting existing files. Returns the number of files copied.
pub fn push_local(src: &Path, dest: &Path, status: &dyn StatusSink) -> Result<usize, TransferError> {
    if !src.is_dir() {
        return Err(TransferError::SourceMissing(src.to_path_buf()));
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| TransferError::Copy {
            path: e.path().unwrap_or(src).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_transferable(path) {
            continue;
        }

        let relative = path.strip_prefix(src).unwrap_or(path);
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| TransferError::Copy {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        status.info(&format!("Copying file: {}...", path.display()));
        fs::copy(path, &target).map_err(|e| TransferError::Copy {
            path: path.to_path_buf(),
            source: e,
        })?;
        status.info(&format!("Copied file: {}", path.display()));
        copied += 1;
    }

    Ok(copied)
}
