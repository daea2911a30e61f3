//! User state persistence with file locking.
//!
//! Holds what survives between sessions: the selected plan and the last
//! weight used per exercise. Saves are atomic (temp file + rename); a missing
//! or corrupted file loads as the default state.

use crate::{CompletedSession, Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// User's persistent state across sessions
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct UserState {
    #[serde(default)]
    pub selected_plan_id: Option<String>,

    /// Last weight used, keyed by exercise id
    #[serde(default)]
    pub last_weights: HashMap<String, f64>,
}

impl UserState {
    /// Load user state under a shared lock.
    ///
    /// A missing, unreadable or corrupted file yields the default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No state file found, using default state");
            return Ok(Self::default());
        }

        match Self::read_locked(path) {
            Ok(state) => {
                tracing::debug!("Loaded user state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!("Ignoring state file {:?}: {}", path, e);
                Ok(Self::default())
            }
        }
    }

    fn read_locked(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;
        let parsed: serde_json::Result<Self> = serde_json::from_reader(BufReader::new(&file));
        file.unlock()?;
        Ok(parsed?)
    }

    /// Write to a temp file beside `path`, sync it, then rename it over
    /// `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("state path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        drop(writer);
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        tracing::debug!("Saved user state to {:?}", path);
        Ok(())
    }

    /// Load state, modify it, and save it back atomically
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut UserState) -> Result<()>,
    {
        let mut state = Self::load(path)?;
        f(&mut state)?;
        state.save(path)?;
        Ok(state)
    }

    /// Remember the final weight of every exercise performed in `session`
    pub fn record_weights(&mut self, session: &CompletedSession) {
        for slot in &session.record.slots {
            for set in slot.sets.iter().filter(|s| s.completed) {
                self.last_weights.insert(set.exercise_id.clone(), set.weight);
            }
        }
    }
}
