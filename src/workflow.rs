use crate::rounds::RoundName;
use crate::state::{RoundStatus, SessionStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod policy;
pub mod resume;

pub use error::WorkflowError;
pub use orchestrator::{ResumeOptions, RunOptions, RunSettings, WorkflowOrchestrator};
pub use plan::{build_repair_prompt, build_round_prompt, round_plan, PromptContext, RoundKind};
pub use policy::PausePolicy;
pub use resume::resolve_resume_point;

pub const WORKFLOW_RESULT_FILE: &str = "workflow_result.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Succeeded,
    Paused,
    FailedRecoverable,
}

impl WorkflowStatus {
    /// Session status left behind once a workflow invocation ends.
    pub fn session_status(self) -> SessionStatus {
        match self {
            Self::Succeeded => SessionStatus::Idle,
            Self::Paused => SessionStatus::Paused,
            Self::FailedRecoverable => SessionStatus::FailedRecoverable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Completed,
    Paused,
    Failed,
}

impl RoundOutcome {
    pub fn round_status(self) -> RoundStatus {
        match self {
            Self::Completed => RoundStatus::Completed,
            Self::Paused => RoundStatus::Paused,
            Self::Failed => RoundStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundExecutionResult {
    pub round_name: RoundName,
    pub status: RoundOutcome,
    pub codex_run_id: Option<String>,
    pub codex_success: Option<bool>,
    pub check_passed: Option<bool>,
    pub repaired: bool,
    pub check_output_path: Option<PathBuf>,
    pub changed_files: usize,
    pub changed_lines: usize,
    pub patch_path: Option<PathBuf>,
    pub notes_snapshot_path: Option<PathBuf>,
    pub pause_reason: Option<String>,
    pub error: Option<String>,
}

/// `runs/<workflow_run_id>/workflow_result.json`, written once per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunResult {
    pub workflow_run_id: String,
    pub status: WorkflowStatus,
    pub started_at: String,
    pub finished_at: String,
    pub rounds: Vec<RoundExecutionResult>,
    pub workflow_result_path: PathBuf,
}
