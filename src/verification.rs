use crate::config::check_script_path;
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::{absolutize, write_json_atomic, JsonWriteError};
use crate::shared::logging::{append_engine_log, LogLevel};
use crate::shared::process::{run_captured, CommandSpec, ProcessError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(300);
pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const CHECK_RESULT_FILE: &str = "check_result.json";

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("check script not found: {path}")]
    MissingScript { path: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run check script: {0}")]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Json(#[from] JsonWriteError),
}

/// Outcome of one verification script run. `passed` follows the exit code
/// alone; `payload` is the script's stdout when it is a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRunResult {
    pub passed: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub payload: Option<Map<String, Value>>,
    pub started_at: String,
    pub finished_at: String,
    pub check_script_path: PathBuf,
    #[serde(default)]
    pub timed_out: bool,
}

impl CheckRunResult {
    pub fn errors(&self) -> Vec<String> {
        self.payload_strings("errors")
    }

    pub fn warnings(&self) -> Vec<String> {
        self.payload_strings("warnings")
    }

    /// Up to three reported errors joined with `; `, or the exit code.
    pub fn error_summary(&self) -> String {
        let errors = self.errors();
        if errors.is_empty() {
            return format!("check failed with exit_code={}", self.exit_code);
        }
        errors.into_iter().take(3).collect::<Vec<_>>().join("; ")
    }

    fn payload_strings(&self, key: &str) -> Vec<String> {
        let Some(Value::Array(items)) = self.payload.as_ref().and_then(|p| p.get(key)) else {
            return Vec::new();
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

pub trait Checker {
    fn run(
        &self,
        project_root: &Path,
        notes_root: &Path,
        output_path: Option<&Path>,
    ) -> Result<CheckRunResult, CheckError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRunner {
    timeout: Duration,
}

impl Default for CheckRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }
}

impl CheckRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Checker for CheckRunner {
    fn run(
        &self,
        project_root: &Path,
        notes_root: &Path,
        output_path: Option<&Path>,
    ) -> Result<CheckRunResult, CheckError> {
        let project = absolutize(project_root).map_err(|e| io_error(project_root, e))?;
        let notes = absolutize(notes_root).map_err(|e| io_error(notes_root, e))?;
        let script = check_script_path(&notes);
        if !script.is_file() {
            return Err(CheckError::MissingScript {
                path: script.display().to_string(),
            });
        }

        let spec = CommandSpec::new(script.display().to_string())
            .arg(project.display().to_string());
        let started_at = now_rfc3339();
        let output = run_captured(&spec, Some(self.timeout))?;
        let finished_at = now_rfc3339();

        let result = if output.timed_out {
            append_engine_log(
                &project,
                LogLevel::Warn,
                "check_timed_out",
                &format!("{} exceeded {}s", script.display(), self.timeout.as_secs()),
            );
            let mut stderr = output.stderr;
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "check script timed out after {}s",
                self.timeout.as_secs_f64()
            ));
            CheckRunResult {
                passed: false,
                exit_code: TIMEOUT_EXIT_CODE,
                stdout: output.stdout,
                stderr,
                payload: None,
                started_at,
                finished_at,
                check_script_path: script,
                timed_out: true,
            }
        } else {
            CheckRunResult {
                passed: output.exit_code == 0,
                exit_code: output.exit_code,
                payload: parse_payload(&output.stdout),
                stdout: output.stdout,
                stderr: output.stderr,
                started_at,
                finished_at,
                check_script_path: script,
                timed_out: false,
            }
        };

        if let Some(path) = output_path {
            write_json_atomic(path, &result)?;
        }
        Ok(result)
    }
}

fn parse_payload(stdout: &str) -> Option<Map<String, Value>> {
    let text = stdout.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CheckError {
    CheckError::Io {
        path: path.display().to_string(),
        source,
    }
}
