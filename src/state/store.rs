use super::{RoundStatusMap, SessionState};
use crate::config::ProjectPaths;
use crate::shared::fs_atomic::{read_json_tolerant, write_json_atomic, JsonReadOutcome, JsonWriteError};
use crate::shared::logging::{append_engine_log, LogLevel};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to persist state: {0}")]
    Persist(#[from] JsonWriteError),
}

/// The only path through which session and round-status documents are read
/// or written.
pub trait StateStore {
    fn load_session(&self) -> SessionState;
    fn save_session(&self, session: &SessionState) -> Result<(), StateError>;
    fn load_round_status(&self) -> RoundStatusMap;
    fn save_round_status(&self, statuses: &RoundStatusMap) -> Result<(), StateError>;
}

/// Stores state as JSON under `<project_root>/state/`. Missing or corrupt
/// documents load as defaults; corruption is logged as a recoverable warning.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    paths: ProjectPaths,
}

impl FileStateStore {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: ProjectPaths::new(project_root),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.paths.root
    }

    /// Writes fresh session and round-status documents, leaving any existing
    /// document untouched.
    pub fn initialize_if_absent(&self, course_id: &str) -> Result<(), StateError> {
        if !self.paths.session_file().exists() {
            self.save_session(&SessionState::new(Some(course_id.to_string())))?;
        }
        if !self.paths.round_status_file().exists() {
            self.save_round_status(&RoundStatusMap::default())?;
        }
        Ok(())
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        match read_json_tolerant(path) {
            JsonReadOutcome::Loaded(value) => value,
            JsonReadOutcome::Missing => T::default(),
            JsonReadOutcome::Invalid { reason } => {
                append_engine_log(
                    &self.paths.root,
                    LogLevel::Warn,
                    "state_recovered",
                    &format!("{} unreadable, using defaults: {reason}", path.display()),
                );
                T::default()
            }
        }
    }
}

impl StateStore for FileStateStore {
    fn load_session(&self) -> SessionState {
        self.load_or_default(&self.paths.session_file())
    }

    fn save_session(&self, session: &SessionState) -> Result<(), StateError> {
        write_json_atomic(&self.paths.session_file(), session)?;
        Ok(())
    }

    fn load_round_status(&self) -> RoundStatusMap {
        self.load_or_default(&self.paths.round_status_file())
    }

    fn save_round_status(&self, statuses: &RoundStatusMap) -> Result<(), StateError> {
        write_json_atomic(&self.paths.round_status_file(), statuses)?;
        Ok(())
    }
}
