use crate::changes::DiffError;
use crate::config::ConfigError;
use crate::execution::ExecutionError;
use crate::rounds::RoundName;
use crate::scaffold::ScaffoldError;
use crate::shared::fs_atomic::JsonWriteError;
use crate::state::StateError;
use crate::verification::CheckError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("generation failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("verification failed: {0}")]
    Check(#[from] CheckError),
    #[error("diff capture failed: {0}")]
    Diff(#[from] DiffError),
    #[error("round0 scaffold failed: {0}")]
    Scaffold(#[from] ScaffoldError),
    #[error(transparent)]
    Json(#[from] JsonWriteError),
    #[error("{0}")]
    InvalidRange(String),
    #[error("invalid workflow_run_id: {0}")]
    InvalidWorkflowRunId(String),
    #[error("workflow run directory already exists: {path}")]
    WorkflowExists { path: String },
    #[error("cannot resume to {target}: the next round to run is {resume_point}")]
    ResumeTargetBeforeResumePoint {
        target: RoundName,
        resume_point: RoundName,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
