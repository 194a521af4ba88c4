//! Gap state persistence.
//!
//! One JSON file per frame set, named `<key><suffix>` inside the store
//! directory. Loading is deliberately infallible: a missing or corrupt
//! file yields a fresh tracker, because losing gap history only costs
//! some re-requested frames while refusing to start costs the station.

use crate::error::GapError;
use crate::gap_list::GapListState;
use crate::tracker::SequenceTracker;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// File-backed store of [`SequenceTracker`] state, keyed by frame set.
#[derive(Debug)]
pub struct GapStateStore {
    dir: PathBuf,
    suffix: String,
}

impl GapStateStore {
    /// Opens or creates a store at `dir` whose files carry `suffix`,
    /// e.g. `-gaps.json`.
    pub fn open(dir: impl AsRef<Path>, suffix: impl Into<String>) -> Result<Self, GapError> {
        let suffix = suffix.into();
        if suffix.is_empty() || suffix.contains(['/', '\\']) {
            return Err(GapError::InvalidSuffix(suffix));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, suffix })
    }

    /// Path of the state file for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, GapError> {
        check_key(key)?;
        Ok(self.dir.join(format!("{}{}", key, self.suffix)))
    }

    /// Writes the tracker's current state for `key`, replacing any
    /// previous file.
    pub fn persist(&self, key: &str, tracker: &SequenceTracker) -> Result<(), GapError> {
        let path = self.path_for(key)?;
        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &tracker.to_state())?;
        tracing::debug!(key, path = %path.display(), "persisted gap state");
        Ok(())
    }

    /// Loads the tracker for `key`, or a fresh full-window tracker when
    /// no usable state exists. Never fails on file contents.
    pub fn load(&self, key: &str) -> Result<SequenceTracker, GapError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            tracing::debug!(key, "no persisted gap state, starting fresh");
            return Ok(SequenceTracker::new());
        }

        let state: Option<GapListState> = File::open(&path)
            .ok()
            .and_then(|file| serde_json::from_reader(BufReader::new(file)).ok());
        match state.and_then(|s| SequenceTracker::from_state(s).ok()) {
            Some(tracker) => Ok(tracker),
            None => {
                tracing::warn!(
                    key,
                    path = %path.display(),
                    "unreadable gap state file, starting fresh"
                );
                Ok(SequenceTracker::new())
            }
        }
    }

    /// Removes the state file for `key`. Removing a file that does not
    /// exist is not an error.
    pub fn clear(&self, key: &str) -> Result<(), GapError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn check_key(key: &str) -> Result<(), GapError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.contains('\0');
    if bad {
        return Err(GapError::InvalidKey(key.to_string()));
    }
    Ok(())
}
