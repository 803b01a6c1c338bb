use super::plan::{build_repair_prompt, build_round_prompt, round_plan, PromptContext, RoundKind};
use super::policy::PausePolicy;
use super::resume::resolve_resume_point;
use super::{
    RoundExecutionResult, RoundOutcome, WorkflowError, WorkflowRunResult, WorkflowStatus,
    WORKFLOW_RESULT_FILE,
};
use crate::changes::{capture_state, write_diff_artifacts, DiffSummary, TextState};
use crate::config::{load_project_config, ProjectConfig, ProjectPaths};
use crate::execution::{
    CodexExecutor, CodexRunRequest, CodexRunResult, Executor, DEFAULT_MAX_RETRIES,
};
use crate::rounds::RoundName;
use crate::scaffold::{ScaffoldRequest, Scaffolder, TemplateScaffolder, ROUND0_INIT_RESULT_FILE};
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::{absolutize, write_json_atomic};
use crate::shared::ids::WorkflowRunId;
use crate::shared::logging::{append_engine_log, LogLevel};
use crate::state::{FileStateStore, RoundStatus, RoundStatusMap, SessionState, SessionStatus, StateStore};
use crate::verification::{CheckRunResult, CheckRunner, Checker, CHECK_RESULT_FILE};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Knobs shared by `run` and `resume`. `None` overrides fall back to the
/// project config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub notes_root: Option<PathBuf>,
    pub target_lectures: Vec<String>,
    pub allow_external_refs: bool,
    pub search_enabled: bool,
    pub model: Option<String>,
    pub max_retries: i32,
    pub workflow_run_id: Option<String>,
    pub auto_repair: bool,
    pub pause_after_each_round: Option<bool>,
    pub max_changed_lines: Option<i64>,
    pub max_changed_files: Option<i64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            notes_root: None,
            target_lectures: Vec::new(),
            allow_external_refs: false,
            search_enabled: false,
            model: None,
            max_retries: DEFAULT_MAX_RETRIES,
            workflow_run_id: None,
            auto_repair: true,
            pause_after_each_round: None,
            max_changed_lines: None,
            max_changed_files: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub from_round: RoundName,
    pub to_round: RoundName,
    pub settings: RunSettings,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            from_round: RoundName::Round1,
            to_round: RoundName::Final,
            settings: RunSettings::default(),
        }
    }
}

impl RunOptions {
    pub fn with_range(mut self, from_round: RoundName, to_round: RoundName) -> Self {
        self.from_round = from_round;
        self.to_round = to_round;
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOptions {
    pub to_round: RoundName,
    pub settings: RunSettings,
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            to_round: RoundName::Final,
            settings: RunSettings::default(),
        }
    }
}

/// Everything one round needs from its enclosing invocation.
struct RoundContext<'a> {
    project_root: &'a Path,
    notes_root: &'a Path,
    workflow_dir: &'a Path,
    workflow_run_id: &'a str,
    config: &'a ProjectConfig,
    settings: &'a RunSettings,
    policy: PausePolicy,
}

impl RoundContext<'_> {
    fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext {
            notes_root: self.notes_root,
            language: &self.config.language,
            target_lectures: &self.settings.target_lectures,
            allow_external_refs: self.settings.allow_external_refs,
        }
    }

    fn codex_request(&self, run_id: String, prompt: String) -> CodexRunRequest {
        CodexRunRequest::new(self.project_root, self.notes_root, prompt)
            .with_run_id(run_id)
            .with_model(self.settings.model.clone())
            .with_search(self.settings.search_enabled)
            .with_max_retries(self.settings.max_retries)
    }
}

fn diff_fields(diff: &DiffSummary) -> (usize, usize, Option<PathBuf>, Option<PathBuf>) {
    (
        diff.changed_files,
        diff.changed_lines,
        Some(diff.patch_path.clone()),
        Some(diff.notes_snapshot_path.clone()),
    )
}

fn io_error(path: &Path, source: std::io::Error) -> WorkflowError {
    WorkflowError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Drives rounds for one project: scaffold, generate, verify, repair once,
/// diff, pause. Round and session state are persisted before and after
/// every round.
pub struct WorkflowOrchestrator {
    project_root: PathBuf,
    executor: Box<dyn Executor>,
    checker: Box<dyn Checker>,
    scaffolder: Box<dyn Scaffolder>,
    state_store: Box<dyn StateStore>,
}

impl WorkflowOrchestrator {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            executor: Box::new(CodexExecutor::default()),
            checker: Box::new(CheckRunner::default()),
            scaffolder: Box::new(TemplateScaffolder::default()),
            state_store: Box::new(FileStateStore::new(project_root.clone())),
            project_root,
        }
    }

    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_checker(mut self, checker: Box<dyn Checker>) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_scaffolder(mut self, scaffolder: Box<dyn Scaffolder>) -> Self {
        self.scaffolder = scaffolder;
        self
    }

    pub fn with_state_store(mut self, state_store: Box<dyn StateStore>) -> Self {
        self.state_store = state_store;
        self
    }

    pub fn run(&self, options: &RunOptions) -> Result<WorkflowRunResult, WorkflowError> {
        let started_at = now_rfc3339();
        let project_root =
            absolutize(&self.project_root).map_err(|e| io_error(&self.project_root, e))?;
        let config = load_project_config(&project_root)?;
        let settings = &options.settings;
        let notes_root = match &settings.notes_root {
            Some(notes) => absolutize(notes).map_err(|e| io_error(notes, e))?,
            None => config.notes_root.clone(),
        };
        let policy = PausePolicy::resolve(
            &config,
            settings.pause_after_each_round,
            settings.max_changed_lines,
            settings.max_changed_files,
        );
        let rounds = RoundName::range(options.from_round, options.to_round)
            .map_err(WorkflowError::InvalidRange)?;
        let (workflow_run_id, workflow_dir) =
            self.create_workflow_dir(&project_root, settings.workflow_run_id.as_deref())?;

        let mut session = self.state_store.load_session();
        let mut statuses = self.state_store.load_round_status();
        session.transition(SessionStatus::Running, Some(workflow_run_id.to_string()));
        self.state_store.save_session(&session)?;
        append_engine_log(
            &project_root,
            LogLevel::Info,
            "workflow_started",
            &format!(
                "workflow {workflow_run_id} rounds {}..{}",
                options.from_round, options.to_round
            ),
        );

        let context = RoundContext {
            project_root: &project_root,
            notes_root: &notes_root,
            workflow_dir: &workflow_dir,
            workflow_run_id: workflow_run_id.as_str(),
            config: &config,
            settings,
            policy,
        };

        let mut workflow_status = WorkflowStatus::Succeeded;
        let mut round_results = Vec::new();
        for &round in rounds {
            statuses.set(round, RoundStatus::Running);
            self.state_store.save_round_status(&statuses)?;
            append_engine_log(
                &project_root,
                LogLevel::Info,
                "round_started",
                &format!("workflow {workflow_run_id} round {round}"),
            );

            let result = match self.execute_round(&context, round) {
                Ok(result) => result,
                Err(err) => {
                    self.abandon_round(&project_root, &mut session, &mut statuses, round, &err);
                    return Err(err);
                }
            };

            statuses.set(round, result.status.round_status());
            self.state_store.save_round_status(&statuses)?;
            let stop = match result.status {
                RoundOutcome::Completed => false,
                RoundOutcome::Paused => {
                    workflow_status = WorkflowStatus::Paused;
                    true
                }
                RoundOutcome::Failed => {
                    workflow_status = WorkflowStatus::FailedRecoverable;
                    true
                }
            };
            append_engine_log(
                &project_root,
                if result.status == RoundOutcome::Failed {
                    LogLevel::Error
                } else {
                    LogLevel::Info
                },
                "round_finished",
                &format!(
                    "workflow {workflow_run_id} round {round} status={:?} changed_files={} changed_lines={}{}",
                    result.status,
                    result.changed_files,
                    result.changed_lines,
                    result
                        .pause_reason
                        .as_deref()
                        .or(result.error.as_deref())
                        .map(|detail| format!(" detail={detail}"))
                        .unwrap_or_default()
                ),
            );
            round_results.push(result);
            if stop {
                break;
            }
        }

        let finished_at = now_rfc3339();
        session.transition(workflow_status.session_status(), None);
        self.state_store.save_session(&session)?;
        self.state_store.save_round_status(&statuses)?;

        let result = WorkflowRunResult {
            workflow_run_id: workflow_run_id.to_string(),
            status: workflow_status,
            started_at,
            finished_at,
            rounds: round_results,
            workflow_result_path: workflow_dir.join(WORKFLOW_RESULT_FILE),
        };
        write_json_atomic(&result.workflow_result_path, &result)?;
        append_engine_log(
            &project_root,
            LogLevel::Info,
            "workflow_finished",
            &format!("workflow {workflow_run_id} status={:?}", result.status),
        );
        Ok(result)
    }

    /// Continues from the persisted round status. A paused round counts as
    /// accepted; resuming with nothing left writes an empty succeeded result.
    pub fn resume(&self, options: &ResumeOptions) -> Result<WorkflowRunResult, WorkflowError> {
        let project_root =
            absolutize(&self.project_root).map_err(|e| io_error(&self.project_root, e))?;
        let mut statuses = self.state_store.load_round_status();
        let resume_point = resolve_resume_point(&statuses);
        append_engine_log(
            &project_root,
            LogLevel::Info,
            "resume_point_resolved",
            &resume_point
                .map(|round| format!("resuming at {round}"))
                .unwrap_or_else(|| "nothing left to run".to_string()),
        );

        if let Some(from_round) = resume_point {
            if options.to_round < from_round {
                return Err(WorkflowError::ResumeTargetBeforeResumePoint {
                    target: options.to_round,
                    resume_point: from_round,
                });
            }
        }

        let accepted: Vec<RoundName> = statuses
            .iter()
            .filter(|(round, status)| {
                *status == RoundStatus::Paused && resume_point.map_or(true, |from| *round < from)
            })
            .map(|(round, _)| round)
            .collect();
        if !accepted.is_empty() {
            for round in accepted {
                statuses.set(round, RoundStatus::Completed);
            }
            self.state_store.save_round_status(&statuses)?;
        }

        let Some(from_round) = resume_point else {
            return self.finish_noop_resume(&project_root, &options.settings);
        };
        self.run(&RunOptions {
            from_round,
            to_round: options.to_round,
            settings: options.settings.clone(),
        })
    }

    fn finish_noop_resume(
        &self,
        project_root: &Path,
        settings: &RunSettings,
    ) -> Result<WorkflowRunResult, WorkflowError> {
        let (workflow_run_id, workflow_dir) =
            self.create_workflow_dir(project_root, settings.workflow_run_id.as_deref())?;
        let mut session = self.state_store.load_session();
        session.transition(SessionStatus::Idle, None);
        self.state_store.save_session(&session)?;

        let now = now_rfc3339();
        let result = WorkflowRunResult {
            workflow_run_id: workflow_run_id.to_string(),
            status: WorkflowStatus::Succeeded,
            started_at: now.clone(),
            finished_at: now,
            rounds: Vec::new(),
            workflow_result_path: workflow_dir.join(WORKFLOW_RESULT_FILE),
        };
        write_json_atomic(&result.workflow_result_path, &result)?;
        Ok(result)
    }

    fn create_workflow_dir(
        &self,
        project_root: &Path,
        requested: Option<&str>,
    ) -> Result<(WorkflowRunId, PathBuf), WorkflowError> {
        let workflow_run_id = match requested {
            Some(raw) => WorkflowRunId::parse(raw).map_err(WorkflowError::InvalidWorkflowRunId)?,
            None => WorkflowRunId::generate().map_err(WorkflowError::InvalidWorkflowRunId)?,
        };
        let paths = ProjectPaths::new(project_root);
        let runs_dir = paths.runs_dir();
        fs::create_dir_all(&runs_dir).map_err(|e| io_error(&runs_dir, e))?;
        let workflow_dir = paths.run_dir(workflow_run_id.as_str());
        match fs::create_dir(&workflow_dir) {
            Ok(()) => Ok((workflow_run_id, workflow_dir)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(WorkflowError::WorkflowExists {
                path: workflow_dir.display().to_string(),
            }),
            Err(err) => Err(io_error(&workflow_dir, err)),
        }
    }

    /// Leaves state resumable after a hard error: the round is failed, the
    /// session is `failed_recoverable` with no current run.
    fn abandon_round(
        &self,
        project_root: &Path,
        session: &mut SessionState,
        statuses: &mut RoundStatusMap,
        round: RoundName,
        err: &WorkflowError,
    ) {
        statuses.set(round, RoundStatus::Failed);
        if let Err(persist_err) = self.state_store.save_round_status(statuses) {
            append_engine_log(
                project_root,
                LogLevel::Error,
                "state_persist_failed",
                &format!("round {round} status not saved: {persist_err}"),
            );
        }
        session.transition(SessionStatus::FailedRecoverable, None);
        if let Err(persist_err) = self.state_store.save_session(session) {
            append_engine_log(
                project_root,
                LogLevel::Error,
                "state_persist_failed",
                &format!("session not saved after round {round}: {persist_err}"),
            );
        }
        append_engine_log(
            project_root,
            LogLevel::Error,
            "round_aborted",
            &format!("round {round} aborted: {err}"),
        );
    }

    fn execute_round(
        &self,
        context: &RoundContext<'_>,
        round: RoundName,
    ) -> Result<RoundExecutionResult, WorkflowError> {
        let before = capture_state(context.notes_root)?;
        match round_plan(round).kind {
            RoundKind::Scaffold => {
                let round_dir = context.workflow_dir.join(round.as_str());
                fs::create_dir_all(&round_dir).map_err(|e| io_error(&round_dir, e))?;
                self.scaffold_round(context, round, &round_dir, &before)
            }
            RoundKind::Generation => self.generation_round(context, round, &before),
        }
    }

    fn scaffold_round(
        &self,
        context: &RoundContext<'_>,
        round: RoundName,
        round_dir: &Path,
        before: &TextState,
    ) -> Result<RoundExecutionResult, WorkflowError> {
        let mut request = ScaffoldRequest::from_config(context.config, context.notes_root);
        request.project_root = context.project_root.to_path_buf();
        let report = self.scaffolder.initialize(&request)?;
        write_json_atomic(&round_dir.join(ROUND0_INIT_RESULT_FILE), &report)?;

        let check_output_path = round_dir.join(CHECK_RESULT_FILE);
        let check = self.checker.run(
            context.project_root,
            context.notes_root,
            Some(&check_output_path),
        )?;
        let after = capture_state(context.notes_root)?;
        let diff = write_diff_artifacts(context.notes_root, before, &after, round_dir)?;
        let (changed_files, changed_lines, patch_path, notes_snapshot_path) = diff_fields(&diff);

        let (status, pause_reason, error) = if check.passed {
            match context.policy.evaluate(round, &diff) {
                Some(reason) => (RoundOutcome::Paused, Some(reason), None),
                None => (RoundOutcome::Completed, None, None),
            }
        } else {
            (RoundOutcome::Failed, None, Some(check.error_summary()))
        };

        Ok(RoundExecutionResult {
            round_name: round,
            status,
            codex_run_id: None,
            codex_success: None,
            check_passed: Some(check.passed),
            repaired: false,
            check_output_path: Some(check_output_path),
            changed_files,
            changed_lines,
            patch_path,
            notes_snapshot_path,
            pause_reason,
            error,
        })
    }

    fn verify_run(
        &self,
        context: &RoundContext<'_>,
        run: &CodexRunResult,
    ) -> Result<CheckRunResult, WorkflowError> {
        let output_path = run.run_dir.join(CHECK_RESULT_FILE);
        Ok(self
            .checker
            .run(context.project_root, context.notes_root, Some(&output_path))?)
    }

    fn generation_round(
        &self,
        context: &RoundContext<'_>,
        round: RoundName,
        before: &TextState,
    ) -> Result<RoundExecutionResult, WorkflowError> {
        let prompt = build_round_prompt(round, &context.prompt_context());
        let primary = self.executor.run(
            &context.codex_request(format!("{}_{round}", context.workflow_run_id), prompt),
        )?;

        let mut final_run = primary;
        let mut check = None;
        let mut repaired = false;
        if final_run.success {
            let first_check = self.verify_run(context, &final_run)?;
            if !first_check.passed && context.settings.auto_repair {
                let repair_prompt = build_repair_prompt(
                    round,
                    &context.prompt_context(),
                    &first_check.errors(),
                    &first_check.warnings(),
                );
                let repair = self.executor.run(&context.codex_request(
                    format!("{}_{round}_repair1", context.workflow_run_id),
                    repair_prompt,
                ))?;
                repaired = true;
                append_engine_log(
                    context.project_root,
                    LogLevel::Warn,
                    "round_repair_attempted",
                    &format!(
                        "round {round} repair run {} success={}",
                        repair.run_id, repair.success
                    ),
                );
                check = if repair.success {
                    Some(self.verify_run(context, &repair)?)
                } else {
                    None
                };
                final_run = repair;
            } else {
                check = Some(first_check);
            }
        }

        let after = capture_state(context.notes_root)?;
        let diff = write_diff_artifacts(context.notes_root, before, &after, &final_run.run_dir)?;
        let (changed_files, changed_lines, patch_path, notes_snapshot_path) = diff_fields(&diff);
        let check_output_path = final_run.run_dir.join(CHECK_RESULT_FILE);

        let mut result = RoundExecutionResult {
            round_name: round,
            status: RoundOutcome::Failed,
            codex_run_id: Some(final_run.run_id.clone()),
            codex_success: Some(final_run.success),
            check_passed: None,
            repaired,
            check_output_path: None,
            changed_files,
            changed_lines,
            patch_path,
            notes_snapshot_path,
            pause_reason: None,
            error: None,
        };

        if !final_run.success {
            result.error = final_run.error.clone();
            return Ok(result);
        }

        match check {
            Some(check) if check.passed => {
                result.check_passed = Some(true);
                result.check_output_path = Some(check_output_path);
                match context.policy.evaluate(round, &diff) {
                    Some(reason) => {
                        result.status = RoundOutcome::Paused;
                        result.pause_reason = Some(reason);
                    }
                    None => result.status = RoundOutcome::Completed,
                }
            }
            Some(check) => {
                result.check_passed = Some(false);
                result.check_output_path = check_output_path.exists().then_some(check_output_path);
                result.error = Some(check.error_summary());
            }
            None => {
                result.check_passed = Some(false);
                result.check_output_path = check_output_path.exists().then_some(check_output_path);
                result.error = Some("check result missing".to_string());
            }
        }
        Ok(result)
    }
}
