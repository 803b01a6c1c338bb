use notes_agent::config::ProjectConfig;
use notes_agent::execution::{CodexRunRequest, CodexRunResult, ExecutionError, Executor};
use notes_agent::history::read_patch;
use notes_agent::project::{create_project, CreateProjectRequest};
use notes_agent::rounds::RoundName;
use notes_agent::scaffold::{ScaffoldError, ScaffoldReport, ScaffoldRequest, Scaffolder};
use notes_agent::shared::fs_atomic::JsonWriteError;
use notes_agent::shared::logging::engine_log_path;
use notes_agent::state::{
    FileStateStore, RoundStatus, RoundStatusMap, SessionState, SessionStatus, StateError,
    StateStore,
};
use notes_agent::verification::{CheckError, CheckRunResult, CheckRunner, Checker};
use notes_agent::workflow::{
    ResumeOptions, RoundOutcome, RunOptions, RunSettings, WorkflowError, WorkflowOrchestrator,
    WorkflowStatus,
};
use serde_json::{json, Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::{tempdir, TempDir};

struct FakeExecutor {
    success_by_run_id: BTreeMap<String, bool>,
    default_success: bool,
    mutate_rel_path: Option<String>,
    calls: Rc<RefCell<Vec<CodexRunRequest>>>,
}

impl FakeExecutor {
    fn new(default_success: bool) -> Self {
        Self {
            success_by_run_id: BTreeMap::new(),
            default_success,
            mutate_rel_path: None,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn failing(mut self, run_id: &str) -> Self {
        self.success_by_run_id.insert(run_id.to_string(), false);
        self
    }

    fn mutating(mut self, rel_path: &str) -> Self {
        self.mutate_rel_path = Some(rel_path.to_string());
        self
    }
}

impl Executor for FakeExecutor {
    fn run(&self, request: &CodexRunRequest) -> Result<CodexRunResult, ExecutionError> {
        self.calls.borrow_mut().push(request.clone());
        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| "missing-run-id".to_string());
        let run_dir = request.project_root.join("runs").join(&run_id);
        fs::create_dir_all(&run_dir).expect("run dir");
        let prompt_path = run_dir.join("prompt.md");
        let stdout_log_path = run_dir.join("codex_stdout.log");
        let last_message_path = run_dir.join("codex_last_message.md");
        let run_manifest_path = run_dir.join("run_manifest.json");
        fs::write(&prompt_path, &request.prompt).expect("prompt");
        fs::write(&stdout_log_path, "fake codex output\n").expect("stdout");
        fs::write(&last_message_path, "fake last message\n").expect("last message");
        fs::write(&run_manifest_path, "{}").expect("manifest");

        let success = self
            .success_by_run_id
            .get(&run_id)
            .copied()
            .unwrap_or(self.default_success);
        if success {
            if let Some(rel) = &self.mutate_rel_path {
                let target = request.notes_root.join(rel);
                fs::create_dir_all(target.parent().expect("parent")).expect("notes dir");
                let existing = fs::read_to_string(&target).unwrap_or_default();
                fs::write(&target, format!("{existing}change-{run_id}\n")).expect("mutate");
            }
        }

        Ok(CodexRunResult {
            run_id,
            run_dir,
            success,
            attempts: 1,
            exit_code: if success { 0 } else { 1 },
            prompt_path,
            stdout_log_path,
            last_message_path,
            run_manifest_path,
            error: (!success).then(|| "forced failure".to_string()),
        })
    }
}

struct RaisingExecutor;

impl Executor for RaisingExecutor {
    fn run(&self, _request: &CodexRunRequest) -> Result<CodexRunResult, ExecutionError> {
        Err(ExecutionError::Io {
            path: "codex".to_string(),
            source: std::io::Error::other("boom during codex execution"),
        })
    }
}

struct FakeChecker {
    outcomes: Vec<bool>,
    calls: Rc<Cell<usize>>,
}

impl FakeChecker {
    fn new(outcomes: &[bool]) -> Self {
        Self {
            outcomes: outcomes.to_vec(),
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl Checker for FakeChecker {
    fn run(
        &self,
        _project_root: &Path,
        notes_root: &Path,
        output_path: Option<&Path>,
    ) -> Result<CheckRunResult, CheckError> {
        let index = self.calls.get().min(self.outcomes.len() - 1);
        let passed = self.outcomes[index];
        self.calls.set(self.calls.get() + 1);
        let payload = json!({
            "passed": passed,
            "errors": if passed { Vec::<&str>::new() } else { vec!["mock check failed"] },
            "warnings": [],
        });
        let payload: Map<String, Value> = payload.as_object().cloned().expect("object");
        let result = CheckRunResult {
            passed,
            exit_code: if passed { 0 } else { 1 },
            stdout: Value::Object(payload.clone()).to_string(),
            stderr: String::new(),
            payload: Some(payload),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: "2026-01-01T00:00:01Z".to_string(),
            check_script_path: notes_root.join("scripts/check.sh"),
            timed_out: false,
        };
        if let Some(path) = output_path {
            fs::create_dir_all(path.parent().expect("parent")).expect("output dir");
            fs::write(path, serde_json::to_vec(&result).expect("encode")).expect("output");
        }
        Ok(result)
    }
}

fn setup() -> (TempDir, ProjectConfig) {
    let temp = tempdir().expect("tempdir");
    let config = create_project(
        &CreateProjectRequest::new("workflow-test").with_workspace_root(temp.path().join("workspace")),
        false,
    )
    .expect("create project");
    (temp, config)
}

fn orchestrator(
    config: &ProjectConfig,
    executor: FakeExecutor,
    checker: FakeChecker,
) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(&config.project_root)
        .with_executor(Box::new(executor))
        .with_checker(Box::new(checker))
}

fn settings(workflow_run_id: &str) -> RunSettings {
    RunSettings {
        workflow_run_id: Some(workflow_run_id.to_string()),
        ..RunSettings::default()
    }
}

fn run_options(from: RoundName, to: RoundName, settings: RunSettings) -> RunOptions {
    RunOptions::default().with_range(from, to).with_settings(settings)
}

fn write_round_status(config: &ProjectConfig, body: &str) {
    fs::write(config.project_root.join("state/round_status.json"), body).expect("round status");
}

#[test]
fn successful_rounds_complete_and_leave_patches() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).mutating("notes/lectures/lecture01.md");
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round2,
            settings("wf_success"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert_eq!(result.rounds.len(), 2);
    assert!(result
        .rounds
        .iter()
        .all(|round| round.status == RoundOutcome::Completed));
    assert!(result.workflow_result_path.is_file());
    assert_eq!(result.rounds[0].codex_run_id.as_deref(), Some("wf_success_round1"));
    assert_eq!(result.rounds[0].changed_files, 1);

    let store = FileStateStore::new(&config.project_root);
    let statuses = store.load_round_status();
    assert_eq!(statuses.get(RoundName::Round1), RoundStatus::Completed);
    assert_eq!(statuses.get(RoundName::Round2), RoundStatus::Completed);
    let session = store.load_session();
    assert_eq!(session.status, SessionStatus::Idle);
    assert_eq!(session.current_run_id, None);

    let patch = read_patch(&config.project_root, "wf_success", Some("round2"))
        .expect("read patch")
        .expect("round2 patch");
    assert!(patch.contains("--- a/notes/lectures/lecture01.md"));
    assert!(read_patch(&config.project_root, "wf_success", None)
        .expect("read latest")
        .is_some());
}

#[test]
fn generation_round_diff_lands_in_codex_run_directory() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).mutating("notes/lectures/lecture01.md");
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("wf_layout"),
        ))
        .expect("run");

    let codex_dir = config.project_root.join("runs/wf_layout_round1");
    let round = &result.rounds[0];
    assert!(round
        .patch_path
        .as_ref()
        .expect("patch path")
        .ends_with("runs/wf_layout_round1/changes.patch"));
    assert!(codex_dir.join("changes.patch").is_file());
    assert!(codex_dir.join("notes_snapshot").is_dir());
    assert!(codex_dir.join("check_result.json").is_file());
    assert!(!config.project_root.join("runs/wf_layout/round1").exists());

    let direct = read_patch(&config.project_root, "wf_layout_round1", None)
        .expect("read")
        .expect("codex run patch");
    assert!(direct.contains("+change-wf_layout_round1"));
    assert_eq!(
        read_patch(&config.project_root, "wf_layout", Some("round1"))
            .expect("read")
            .as_deref(),
        Some(direct.as_str())
    );
}

#[test]
fn generation_failure_stops_workflow_without_repair() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).failing("wf_fail_round1");
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round3,
            settings("wf_fail"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::FailedRecoverable);
    assert_eq!(result.rounds.len(), 1);
    let round = &result.rounds[0];
    assert_eq!(round.round_name, RoundName::Round1);
    assert_eq!(round.status, RoundOutcome::Failed);
    assert_eq!(round.codex_success, Some(false));
    assert_eq!(round.check_passed, None);
    assert_eq!(round.error.as_deref(), Some("forced failure"));
    assert_eq!(calls.borrow().len(), 1);

    let store = FileStateStore::new(&config.project_root);
    assert_eq!(
        store.load_round_status().get(RoundName::Round2),
        RoundStatus::Pending
    );
    assert_eq!(store.load_session().status, SessionStatus::FailedRecoverable);
}

#[test]
fn failed_check_gets_exactly_one_repair() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true);
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[false, true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("wf_repair"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    let round = &result.rounds[0];
    assert!(round.repaired);
    assert_eq!(round.codex_run_id.as_deref(), Some("wf_repair_round1_repair1"));
    assert_eq!(calls.borrow().len(), 2);
    let repair_prompt = &calls.borrow()[1].prompt;
    assert!(repair_prompt.contains("- mock check failed"));
    assert!(round
        .check_output_path
        .as_ref()
        .expect("check output")
        .ends_with("wf_repair_round1_repair1/check_result.json"));
}

#[test]
fn repair_that_still_fails_the_check_aborts_the_round() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true);
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[false]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Final,
            settings("wf_repair_fail"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::FailedRecoverable);
    assert_eq!(result.rounds.len(), 1);
    let round = &result.rounds[0];
    assert!(round.repaired);
    assert_eq!(round.check_passed, Some(false));
    assert_eq!(round.error.as_deref(), Some("mock check failed"));
    assert_eq!(calls.borrow().len(), 2);
}

#[test]
fn failed_repair_generation_keeps_repair_run_and_skips_check() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).failing("wf_repair_gen_round1_repair1");
    let calls = Rc::clone(&executor.calls);
    let checker = FakeChecker::new(&[false, true]);
    let checks = Rc::clone(&checker.calls);
    let workflow = orchestrator(&config, executor, checker);

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Final,
            settings("wf_repair_gen"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::FailedRecoverable);
    assert_eq!(result.rounds.len(), 1);
    let round = &result.rounds[0];
    assert_eq!(round.status, RoundOutcome::Failed);
    assert_eq!(
        round.codex_run_id.as_deref(),
        Some("wf_repair_gen_round1_repair1")
    );
    assert_eq!(round.codex_success, Some(false));
    assert_eq!(round.check_passed, None);
    assert!(round.repaired);
    assert_eq!(round.error.as_deref(), Some("forced failure"));
    assert_eq!(calls.borrow().len(), 2);
    assert_eq!(checks.get(), 1);
    assert_eq!(
        FileStateStore::new(&config.project_root)
            .load_round_status()
            .get(RoundName::Round1),
        RoundStatus::Failed
    );
}

#[test]
fn auto_repair_disabled_fails_on_first_check() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true);
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[false, true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            RunSettings {
                auto_repair: false,
                ..settings("wf_no_repair")
            },
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::FailedRecoverable);
    assert!(!result.rounds[0].repaired);
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn changed_lines_over_threshold_pauses() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).mutating("notes/lectures/lecture01.md");
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round3,
            RunSettings {
                max_changed_lines: Some(0),
                ..settings("wf_pause_threshold")
            },
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Paused);
    assert_eq!(result.rounds.len(), 1);
    assert_eq!(result.rounds[0].status, RoundOutcome::Paused);
    assert_eq!(
        result.rounds[0].pause_reason.as_deref(),
        Some("changed_lines threshold exceeded: 1 > 0")
    );
    assert_eq!(
        FileStateStore::new(&config.project_root)
            .load_session()
            .status,
        SessionStatus::Paused
    );
}

#[test]
fn pause_after_each_round_stops_after_first_round() {
    let (_temp, config) = setup();
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round3,
            RunSettings {
                pause_after_each_round: Some(true),
                ..settings("wf_pause_each")
            },
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Paused);
    assert_eq!(result.rounds.len(), 1);
    assert_eq!(result.rounds[0].round_name, RoundName::Round1);
    assert_eq!(
        result.rounds[0].pause_reason.as_deref(),
        Some("pause_after_each_round enabled")
    );
}

#[test]
fn round0_only_workflow_scaffolds_and_runs_real_check() {
    let (_temp, config) = setup();
    let workflow = WorkflowOrchestrator::new(&config.project_root)
        .with_executor(Box::new(FakeExecutor::new(true)))
        .with_checker(Box::new(CheckRunner::new()));

    let result = workflow
        .run(&run_options(
            RoundName::Round0,
            RoundName::Round0,
            settings("wf_round0"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert_eq!(result.rounds.len(), 1);
    let round = &result.rounds[0];
    assert_eq!(round.round_name, RoundName::Round0);
    assert_eq!(round.codex_run_id, None);
    assert_eq!(round.check_passed, Some(true));
    assert!(config.notes_root.join("scripts/check.sh").is_file());
    let round_dir = config.project_root.join("runs/wf_round0/round0");
    assert!(round_dir.join("round0_init_result.json").is_file());
    assert!(round_dir.join("check_result.json").is_file());
    assert!(round.changed_files > 0);
}

#[test]
fn resume_after_pause_starts_at_next_round() {
    let (_temp, config) = setup();
    let executor = FakeExecutor::new(true).mutating("notes/lectures/lecture01.md");
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let first = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round3,
            RunSettings {
                pause_after_each_round: Some(true),
                ..settings("wf_pause_for_resume")
            },
        ))
        .expect("first run");
    assert_eq!(first.status, WorkflowStatus::Paused);

    let resumed = workflow
        .resume(&ResumeOptions {
            to_round: RoundName::Round3,
            settings: RunSettings {
                pause_after_each_round: Some(false),
                ..settings("wf_resumed")
            },
        })
        .expect("resume");

    assert_eq!(resumed.status, WorkflowStatus::Succeeded);
    let rounds: Vec<RoundName> = resumed.rounds.iter().map(|r| r.round_name).collect();
    assert_eq!(rounds, vec![RoundName::Round2, RoundName::Round3]);
    let run_ids: Vec<String> = calls
        .borrow()
        .iter()
        .filter_map(|request| request.run_id.clone())
        .collect();
    assert_eq!(
        run_ids,
        vec![
            "wf_pause_for_resume_round1".to_string(),
            "wf_resumed_round2".to_string(),
            "wf_resumed_round3".to_string(),
        ]
    );
    assert_eq!(
        FileStateStore::new(&config.project_root)
            .load_round_status()
            .get(RoundName::Round1),
        RoundStatus::Completed
    );
}

#[test]
fn resume_with_everything_completed_is_a_noop() {
    let (_temp, config) = setup();
    write_round_status(
        &config,
        r#"{"round0":"completed","round1":"completed","round2":"completed","round3":"completed","final":"completed"}"#,
    );
    fs::write(
        config.project_root.join("state/session.json"),
        r#"{"course_id":"workflow-test","status":"paused","current_run_id":"wf_old","created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-02T00:00:00Z"}"#,
    )
    .expect("session");
    let executor = FakeExecutor::new(true);
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .resume(&ResumeOptions {
            settings: settings("wf_resume_noop"),
            ..ResumeOptions::default()
        })
        .expect("resume");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert!(result.rounds.is_empty());
    assert!(result.workflow_result_path.is_file());
    assert!(calls.borrow().is_empty());
    let session = FileStateStore::new(&config.project_root).load_session();
    assert_eq!(session.status, SessionStatus::Idle);
    assert_eq!(session.current_run_id, None);
    assert_eq!(session.created_at, "2026-01-01T00:00:00Z");
}

#[test]
fn hard_error_mid_round_leaves_state_recoverable() {
    let (_temp, config) = setup();
    let workflow = WorkflowOrchestrator::new(&config.project_root)
        .with_executor(Box::new(RaisingExecutor))
        .with_checker(Box::new(FakeChecker::new(&[true])));

    let err = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("wf_boom"),
        ))
        .expect_err("hard error");
    assert!(err.to_string().contains("boom during codex execution"));

    let store = FileStateStore::new(&config.project_root);
    let session = store.load_session();
    assert_eq!(session.status, SessionStatus::FailedRecoverable);
    assert_eq!(session.current_run_id, None);
    assert_eq!(
        store.load_round_status().get(RoundName::Round1),
        RoundStatus::Failed
    );
}

/// Delegates to the file store but refuses to persist the failure states.
struct RefusingStateStore {
    inner: FileStateStore,
}

fn refused(path: &str) -> StateError {
    StateError::Persist(JsonWriteError::Write {
        path: path.to_string(),
        source: std::io::Error::other("disk full"),
    })
}

impl StateStore for RefusingStateStore {
    fn load_session(&self) -> SessionState {
        self.inner.load_session()
    }

    fn save_session(&self, session: &SessionState) -> Result<(), StateError> {
        if session.status == SessionStatus::FailedRecoverable {
            return Err(refused("state/session.json"));
        }
        self.inner.save_session(session)
    }

    fn load_round_status(&self) -> RoundStatusMap {
        self.inner.load_round_status()
    }

    fn save_round_status(&self, statuses: &RoundStatusMap) -> Result<(), StateError> {
        if statuses.get(RoundName::Round1) == RoundStatus::Failed {
            return Err(refused("state/round_status.json"));
        }
        self.inner.save_round_status(statuses)
    }
}

#[test]
fn state_that_cannot_be_saved_after_a_hard_error_is_logged() {
    let (_temp, config) = setup();
    let workflow = WorkflowOrchestrator::new(&config.project_root)
        .with_executor(Box::new(RaisingExecutor))
        .with_checker(Box::new(FakeChecker::new(&[true])))
        .with_state_store(Box::new(RefusingStateStore {
            inner: FileStateStore::new(&config.project_root),
        }));

    let err = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("wf_unsaved"),
        ))
        .expect_err("hard error");
    assert!(err.to_string().contains("boom during codex execution"));

    let log = fs::read_to_string(engine_log_path(&config.project_root)).expect("engine log");
    let persist_failures: Vec<Value> = log
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("log line"))
        .filter(|event| event["event"] == "state_persist_failed")
        .collect();
    assert_eq!(persist_failures.len(), 2);
    assert!(persist_failures.iter().all(|event| event["level"] == "error"));
    assert!(persist_failures[0]["message"]
        .as_str()
        .expect("message")
        .contains("disk full"));
    assert!(log.contains("round_aborted"));
}

#[test]
fn resume_rejects_target_before_resume_point() {
    let (_temp, config) = setup();
    write_round_status(
        &config,
        r#"{"round0":"completed","round1":"completed","round2":"failed","round3":"pending","final":"pending"}"#,
    );
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));

    let err = workflow
        .resume(&ResumeOptions {
            to_round: RoundName::Round1,
            settings: settings("wf_resume_invalid_target"),
        })
        .expect_err("target before resume point");
    assert!(matches!(
        err,
        WorkflowError::ResumeTargetBeforeResumePoint {
            target: RoundName::Round1,
            resume_point: RoundName::Round2,
        }
    ));
    assert!(!config
        .project_root
        .join("runs/wf_resume_invalid_target")
        .exists());
}

#[test]
fn traversal_workflow_run_id_is_rejected() {
    let (_temp, config) = setup();
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));

    let err = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("../wf_escape"),
        ))
        .expect_err("traversal");
    assert!(err
        .to_string()
        .contains("workflow_run_id must be a single path component"));
    assert!(!config.project_root.join("wf_escape").exists());
}

#[test]
fn duplicate_workflow_run_id_is_rejected() {
    let (_temp, config) = setup();
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));
    let options = run_options(RoundName::Round1, RoundName::Round1, settings("wf_once"));
    workflow.run(&options).expect("first run");

    let err = workflow.run(&options).expect_err("second run");
    assert!(matches!(err, WorkflowError::WorkflowExists { .. }));
}

#[test]
fn backwards_range_is_rejected() {
    let (_temp, config) = setup();
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));
    let err = workflow
        .run(&run_options(
            RoundName::Round3,
            RoundName::Round1,
            settings("wf_backwards"),
        ))
        .expect_err("backwards");
    assert_eq!(
        err.to_string(),
        "from_round must be <= to_round, got round3 -> round1"
    );
}

#[test]
fn resume_with_final_paused_marks_it_completed_without_rerun() {
    let (_temp, config) = setup();
    write_round_status(
        &config,
        r#"{"round0":"completed","round1":"completed","round2":"completed","round3":"completed","final":"paused"}"#,
    );
    let executor = FakeExecutor::new(true);
    let calls = Rc::clone(&executor.calls);
    let workflow = orchestrator(&config, executor, FakeChecker::new(&[true]));

    let result = workflow
        .resume(&ResumeOptions {
            settings: settings("wf_resume_final_paused"),
            ..ResumeOptions::default()
        })
        .expect("resume");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert!(result.rounds.is_empty());
    assert!(calls.borrow().is_empty());
    assert_eq!(
        FileStateStore::new(&config.project_root)
            .load_round_status()
            .get(RoundName::Final),
        RoundStatus::Completed
    );
}

#[test]
fn corrupted_state_documents_do_not_block_a_run() {
    let (_temp, config) = setup();
    fs::write(config.project_root.join("state/session.json"), "{broken\n").expect("session");
    write_round_status(&config, "{broken\n");
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]));

    let result = workflow
        .run(&run_options(
            RoundName::Round1,
            RoundName::Round1,
            settings("wf_corrupt_state"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    let statuses = FileStateStore::new(&config.project_root).load_round_status();
    assert_eq!(statuses.get(RoundName::Round1), RoundStatus::Completed);
    let log = fs::read_to_string(config.project_root.join("logs/engine.log")).expect("log");
    assert!(log.contains("state_recovered"));
}

struct RecordingScaffolder {
    calls: Rc<Cell<usize>>,
}

impl Scaffolder for RecordingScaffolder {
    fn initialize(&self, request: &ScaffoldRequest) -> Result<ScaffoldReport, ScaffoldError> {
        self.calls.set(self.calls.get() + 1);
        Ok(ScaffoldReport {
            notes_root: request.notes_root.clone(),
            created_files: Vec::new(),
            updated_files: Vec::new(),
            skipped_files: Vec::new(),
        })
    }
}

#[test]
fn round0_uses_injected_scaffolder_and_state_store() {
    let (_temp, config) = setup();
    let calls = Rc::new(Cell::new(0));
    let workflow = orchestrator(&config, FakeExecutor::new(true), FakeChecker::new(&[true]))
        .with_scaffolder(Box::new(RecordingScaffolder {
            calls: Rc::clone(&calls),
        }))
        .with_state_store(Box::new(FileStateStore::new(&config.project_root)));

    let result = workflow
        .run(&run_options(
            RoundName::Round0,
            RoundName::Round0,
            settings("wf_injected"),
        ))
        .expect("run");

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert_eq!(calls.get(), 1);
    assert_eq!(result.rounds[0].changed_files, 0);
    let init: Value = serde_json::from_str(
        &fs::read_to_string(
            config
                .project_root
                .join("runs/wf_injected/round0/round0_init_result.json"),
        )
        .expect("init result"),
    )
    .expect("parse");
    assert_eq!(init["created_files"], json!([]));
}
