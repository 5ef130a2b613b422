//! Staging snapshot file.
//!
//! The whole staging area is one JSON object mapping album title to entry.
//! Early releases wrote a JSON array of entries instead; that layout is
//! still accepted on load and rewritten as an object on the next save.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::entry::StagingEntry;
use super::repository::{StagingError, StagingRepository};

#[derive(Deserialize)]
#[serde(untagged)]
enum StagingFile {
    Keyed(BTreeMap<String, StagingEntry>),
    Legacy(Vec<StagingEntry>),
}

impl StagingRepository {
    /// Load the staging area from `path`.
    ///
    /// A missing file yields an empty staging area.
    pub fn load(path: &Path, output_dir: impl Into<PathBuf>) -> Result<Self, StagingError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(target: "staging", path = %path.display(), "No staging file, starting empty");
                return Ok(Self::new(output_dir));
            }
            Err(e) => return Err(e.into()),
        };

        let entries = match serde_json::from_str::<StagingFile>(&contents)? {
            StagingFile::Keyed(entries) => entries,
            StagingFile::Legacy(list) => {
                tracing::info!(target: "staging", count = list.len(), "Converting legacy staging layout");
                list.into_iter()
                    .map(|entry| (entry.title.clone(), entry))
                    .collect()
            }
        };

        tracing::info!(target: "staging", path = %path.display(), count = entries.len(), "Loaded staging area");
        Ok(Self::with_entries(output_dir, entries))
    }

    /// Write the full staging area to `path` (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StagingError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self.entries())?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        tracing::debug!(target: "staging", path = %path.display(), count = self.len(), "Saved staging area");
        Ok(())
    }
}
