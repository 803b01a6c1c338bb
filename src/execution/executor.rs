use crate::config::ProjectPaths;
use crate::execution::classify::first_nonempty_line;
use crate::execution::{
    build_codex_invocation, extract_error_summary, io_error, merge_stdio, AttemptRecord,
    CodexRunRequest, CodexRunResult, ExecutionError, FailureClassifier, MarkerClassifier,
    RetryReason, RunManifest, ToolBinaries, ASK_FOR_APPROVAL_MODE, SANDBOX_MODE,
};
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::{absolutize, write_json_atomic};
use crate::shared::ids::RunId;
use crate::shared::logging::{append_engine_log, LogLevel};
use crate::shared::process::{run_captured, ProcessError, ProcessOutput};
use std::fs;
use std::io::ErrorKind;

pub const PROMPT_FILE: &str = "prompt.md";
pub const STDOUT_LOG_FILE: &str = "codex_stdout.log";
pub const LAST_MESSAGE_FILE: &str = "codex_last_message.md";
pub const RUN_MANIFEST_FILE: &str = "run_manifest.json";

/// Runs the generation tool for one request. Subprocess failures are
/// reported through `CodexRunResult::success`; only configuration and
/// filesystem problems come back as `Err`.
pub trait Executor {
    fn run(&self, request: &CodexRunRequest) -> Result<CodexRunResult, ExecutionError>;
}

pub struct CodexExecutor {
    binaries: ToolBinaries,
    classifier: Box<dyn FailureClassifier>,
}

impl Default for CodexExecutor {
    fn default() -> Self {
        Self {
            binaries: ToolBinaries::from_env(),
            classifier: Box::new(MarkerClassifier::default()),
        }
    }
}

impl CodexExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binaries(mut self, binaries: ToolBinaries) -> Self {
        self.binaries = binaries;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn read_codex_version(&self) -> String {
        match run_captured(&self.binaries.version_probe(), None) {
            Ok(output) => first_nonempty_line(&merge_stdio(&output.stdout, &output.stderr))
                .map(str::to_string)
                .unwrap_or_else(|| "unknown".to_string()),
            Err(_) => "unknown".to_string(),
        }
    }
}

impl Executor for CodexExecutor {
    fn run(&self, request: &CodexRunRequest) -> Result<CodexRunResult, ExecutionError> {
        if request.max_retries < 0 {
            return Err(ExecutionError::InvalidRetryCount(request.max_retries));
        }
        let run_id = match &request.run_id {
            Some(raw) => RunId::parse(raw).map_err(ExecutionError::InvalidRunId)?,
            None => RunId::generate().map_err(ExecutionError::IdGeneration)?,
        };
        let project_root =
            absolutize(&request.project_root).map_err(|e| io_error(&request.project_root, e))?;
        let notes_root =
            absolutize(&request.notes_root).map_err(|e| io_error(&request.notes_root, e))?;

        let paths = ProjectPaths::new(&project_root);
        let runs_dir = paths.runs_dir();
        fs::create_dir_all(&runs_dir).map_err(|e| io_error(&runs_dir, e))?;
        let run_dir = paths.run_dir(run_id.as_str());
        match fs::create_dir(&run_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(ExecutionError::RunAlreadyExists {
                    path: run_dir.display().to_string(),
                })
            }
            Err(err) => return Err(io_error(&run_dir, err)),
        }

        let prompt_path = run_dir.join(PROMPT_FILE);
        let stdout_log_path = run_dir.join(STDOUT_LOG_FILE);
        let last_message_path = run_dir.join(LAST_MESSAGE_FILE);
        let run_manifest_path = run_dir.join(RUN_MANIFEST_FILE);
        fs::write(&prompt_path, &request.prompt).map_err(|e| io_error(&prompt_path, e))?;

        let invocation = build_codex_invocation(
            request,
            &project_root,
            &notes_root,
            &last_message_path,
            &self.binaries,
        );
        let max_attempts = request.max_retries.unsigned_abs() + 1;
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut stdout_log = String::new();
        let mut final_exit_code = 1;
        let mut final_error = None;

        for attempt in 1..=max_attempts {
            let started_at = now_rfc3339();
            let output = run_captured(&invocation, None).unwrap_or_else(spawn_failure_output);
            let ended_at = now_rfc3339();
            final_exit_code = output.exit_code;
            let stdio = merge_stdio(&output.stdout, &output.stderr);
            stdout_log.push_str(&format!(
                "=== attempt {attempt} ({started_at} -> {ended_at}) ===\n{stdio}\n"
            ));
            attempts.push(AttemptRecord {
                attempt,
                started_at,
                ended_at,
                exit_code: output.exit_code,
                retry_reason: None,
            });

            if output.exit_code == 0 {
                final_error = None;
                break;
            }

            final_error = Some(
                extract_error_summary(&stdio)
                    .unwrap_or_else(|| format!("codex exited with {}", output.exit_code)),
            );
            if attempt < max_attempts && self.classifier.is_retryable(&stdio) {
                if let Some(record) = attempts.last_mut() {
                    record.retry_reason = Some(RetryReason::RetryableFailure);
                }
                append_engine_log(
                    &project_root,
                    LogLevel::Warn,
                    "codex_attempt_retry",
                    &format!(
                        "run {run_id} attempt {attempt} exited {} with retryable output",
                        output.exit_code
                    ),
                );
                continue;
            }
            break;
        }

        fs::write(&stdout_log_path, &stdout_log).map_err(|e| io_error(&stdout_log_path, e))?;
        if !last_message_path.exists() {
            fs::write(&last_message_path, "").map_err(|e| io_error(&last_message_path, e))?;
        }

        let success = final_exit_code == 0;
        let manifest = RunManifest {
            run_id: run_id.to_string(),
            project_root: project_root.clone(),
            notes_root: notes_root.clone(),
            model: request.model.clone(),
            codex_cli_version: self.read_codex_version(),
            sandbox_mode: SANDBOX_MODE.to_string(),
            ask_for_approval_mode: ASK_FOR_APPROVAL_MODE.to_string(),
            search_enabled: request.search_enabled,
            network_enabled: request.search_enabled,
            writable_dirs: vec![project_root.clone(), notes_root],
            max_retries: request.max_retries,
            attempts,
            final_exit_code,
            success,
            created_at: now_rfc3339(),
        };
        write_json_atomic(&run_manifest_path, &manifest)?;

        append_engine_log(
            &project_root,
            if success { LogLevel::Info } else { LogLevel::Error },
            "codex_run_finished",
            &format!(
                "run {run_id} success={success} attempts={} exit_code={final_exit_code}",
                manifest.attempts.len()
            ),
        );

        Ok(CodexRunResult {
            run_id: run_id.to_string(),
            run_dir,
            success,
            attempts: u32::try_from(manifest.attempts.len()).unwrap_or(u32::MAX),
            exit_code: final_exit_code,
            prompt_path,
            stdout_log_path,
            last_message_path,
            run_manifest_path,
            error: final_error,
        })
    }
}

/// A tool that cannot be started is a failed, non-retryable attempt.
fn spawn_failure_output(err: ProcessError) -> ProcessOutput {
    let exit_code = match err {
        ProcessError::MissingBinary { .. } => 127,
        _ => 126,
    };
    ProcessOutput {
        exit_code,
        stdout: String::new(),
        stderr: format!("error: {err}"),
        timed_out: false,
    }
}
