//! Persistence store for finished sessions.
//!
//! The engine writes exactly one [`CompletedSession`] per completed run and
//! reads the last known weight when a set starts. [`FileStore`] keeps
//! sessions in the JSONL WAL and weights/plan selection in the state file.

use crate::state::UserState;
use crate::wal::JsonlWal;
use crate::{CompletedSession, Error, Result};
use std::path::{Path, PathBuf};

pub trait SessionStore {
    /// Durably record a finished session. Failures surface as `WriteError`.
    fn save_session_record(&mut self, session: &CompletedSession) -> Result<()>;

    fn load_last_known_weight(&self, exercise_id: &str) -> Result<Option<f64>>;

    /// Plan the user last selected, if any
    fn selected_plan(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Store backed by the data directory layout
#[derive(Clone, Debug)]
pub struct FileStore {
    wal: JsonlWal,
    state_path: PathBuf,
}

impl FileStore {
    pub fn new(wal_path: impl Into<PathBuf>, state_path: impl Into<PathBuf>) -> Self {
        Self {
            wal: JsonlWal::new(wal_path),
            state_path: state_path.into(),
        }
    }

    /// Standard layout under a data directory
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(wal_path(data_dir), state_path(data_dir))
    }

    pub fn wal_path(&self) -> &Path {
        self.wal.path()
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn select_plan(&self, plan_id: &str) -> Result<()> {
        UserState::update(&self.state_path, |state| {
            state.selected_plan_id = Some(plan_id.to_string());
            Ok(())
        })?;
        tracing::info!("Selected plan {}", plan_id);
        Ok(())
    }
}

pub fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join("sessions.wal")
}

pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join("state.json")
}

pub fn csv_path(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions.csv")
}

impl SessionStore for FileStore {
    fn save_session_record(&mut self, session: &CompletedSession) -> Result<()> {
        self.wal
            .append(session)
            .map_err(|e| Error::WriteError(e.to_string()))?;

        // Weight cache is best-effort once the WAL append succeeded
        if let Err(e) = UserState::update(&self.state_path, |state| {
            state.record_weights(session);
            Ok(())
        }) {
            tracing::warn!("Session saved but weight cache not updated: {}", e);
        }

        tracing::info!("Saved session {}", session.record.id);
        Ok(())
    }

    fn load_last_known_weight(&self, exercise_id: &str) -> Result<Option<f64>> {
        let state = UserState::load(&self.state_path)?;
        Ok(state.last_weights.get(exercise_id).copied())
    }

    fn selected_plan(&self) -> Result<Option<String>> {
        Ok(UserState::load(&self.state_path)?.selected_plan_id)
    }
}

/// Store that keeps everything in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pub sessions: Vec<CompletedSession>,
    pub state: UserState,
}

impl SessionStore for MemoryStore {
    fn save_session_record(&mut self, session: &CompletedSession) -> Result<()> {
        self.state.record_weights(session);
        self.sessions.push(session.clone());
        Ok(())
    }

    fn load_last_known_weight(&self, exercise_id: &str) -> Result<Option<f64>> {
        Ok(self.state.last_weights.get(exercise_id).copied())
    }

    fn selected_plan(&self) -> Result<Option<String>> {
        Ok(self.state.selected_plan_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::tests::completed_session;

    #[test]
    fn test_file_store_saves_and_caches_weights() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::in_data_dir(temp_dir.path());

        assert_eq!(store.load_last_known_weight("goblet_squat").unwrap(), None);

        store
            .save_session_record(&completed_session(0, 24.0))
            .unwrap();

        assert_eq!(store.wal.read_all().unwrap().len(), 1);
        assert_eq!(
            store.load_last_known_weight("goblet_squat").unwrap(),
            Some(24.0)
        );
    }

    #[test]
    fn test_file_store_selected_plan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_data_dir(temp_dir.path());

        assert_eq!(store.selected_plan().unwrap(), None);
        store.select_plan("upper_body").unwrap();
        assert_eq!(store.selected_plan().unwrap(), Some("upper_body".into()));
    }

    #[test]
    fn test_write_failure_maps_to_write_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A file where the WAL directory should be
        std::fs::write(temp_dir.path().join("wal"), "not a dir").unwrap();
        let mut store = FileStore::in_data_dir(temp_dir.path());

        let err = store
            .save_session_record(&completed_session(0, 10.0))
            .unwrap_err();
        assert!(matches!(err, Error::WriteError(_)));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::default();
        store
            .save_session_record(&completed_session(0, 30.0))
            .unwrap();
        assert_eq!(store.sessions.len(), 1);
        assert_eq!(store.load_last_known_weight("push_up").unwrap(), Some(30.0));
    }
}
