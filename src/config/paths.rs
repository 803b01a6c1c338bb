use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_FILE: &str = "project.yaml";
pub const STATE_DIR_NAME: &str = "state";
pub const RUNS_DIR_NAME: &str = "runs";
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";
pub const CHECK_SCRIPT_REL_PATH: &str = "scripts/check.sh";
pub const FEEDBACK_REL_PATH: &str = "review/feedback.md";

/// Fixed on-disk layout of one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![
            self.root.clone(),
            self.state_dir(),
            self.runs_dir(),
            self.artifacts_dir(),
        ]
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(PROJECT_CONFIG_FILE)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR_NAME)
    }

    pub fn session_file(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }

    pub fn round_status_file(&self) -> PathBuf {
        self.state_dir().join("round_status.json")
    }

    pub fn round0_marker_file(&self) -> PathBuf {
        self.state_dir().join("round0_initialized_at.txt")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR_NAME)
    }

    /// Callers must validate `run_id` as a single path component first.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(run_id)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(ARTIFACTS_DIR_NAME)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.artifacts_dir().join("snapshots")
    }

    pub fn source_index_file(&self) -> PathBuf {
        self.artifacts_dir().join("source_index.json")
    }

    pub fn source_hashes_file(&self) -> PathBuf {
        self.artifacts_dir().join("source_hashes.json")
    }
}

pub fn check_script_path(notes_root: &Path) -> PathBuf {
    notes_root.join(CHECK_SCRIPT_REL_PATH)
}

pub fn feedback_file_path(notes_root: &Path) -> PathBuf {
    notes_root.join(FEEDBACK_REL_PATH)
}
