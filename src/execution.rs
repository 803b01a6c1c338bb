use crate::shared::fs_atomic::JsonWriteError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod classify;
pub mod executor;
pub mod invocation;

pub use classify::{extract_error_summary, merge_stdio, FailureClassifier, MarkerClassifier};
pub use executor::{CodexExecutor, Executor};
pub use invocation::{build_codex_invocation, ToolBinaries, CODEX_BIN_ENV};

pub const DEFAULT_MAX_RETRIES: i32 = 2;
pub const SANDBOX_MODE: &str = "workspace-write";
pub const ASK_FOR_APPROVAL_MODE: &str = "never";

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("max_retries must be >= 0, got {0}")]
    InvalidRetryCount(i32),
    #[error("invalid run id: {0}")]
    InvalidRunId(String),
    #[error("run directory already exists: {path}")]
    RunAlreadyExists { path: String },
    #[error("run id generation failed: {0}")]
    IdGeneration(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] JsonWriteError),
}

/// One invocation of the generation tool, retried on transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexRunRequest {
    pub project_root: PathBuf,
    pub notes_root: PathBuf,
    pub prompt: String,
    pub run_id: Option<String>,
    pub model: Option<String>,
    pub search_enabled: bool,
    pub max_retries: i32,
}

impl CodexRunRequest {
    pub fn new(
        project_root: impl Into<PathBuf>,
        notes_root: impl Into<PathBuf>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            notes_root: notes_root.into(),
            prompt: prompt.into(),
            run_id: None,
            model: None,
            search_enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_search(mut self, enabled: bool) -> Self {
        self.search_enabled = enabled;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodexRunResult {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub success: bool,
    pub attempts: u32,
    pub exit_code: i32,
    pub prompt_path: PathBuf,
    pub stdout_log_path: PathBuf,
    pub last_message_path: PathBuf,
    pub run_manifest_path: PathBuf,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    RetryableFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: String,
    pub ended_at: String,
    pub exit_code: i32,
    pub retry_reason: Option<RetryReason>,
}

/// `runs/<run_id>/run_manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub project_root: PathBuf,
    pub notes_root: PathBuf,
    pub model: Option<String>,
    pub codex_cli_version: String,
    pub sandbox_mode: String,
    pub ask_for_approval_mode: String,
    pub search_enabled: bool,
    pub network_enabled: bool,
    pub writable_dirs: Vec<PathBuf>,
    pub max_retries: i32,
    pub attempts: Vec<AttemptRecord>,
    pub final_exit_code: i32,
    pub success: bool,
    pub created_at: String,
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> ExecutionError {
    ExecutionError::Io {
        path: path.display().to_string(),
        source,
    }
}
