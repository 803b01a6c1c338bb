use crate::changes::PATCH_FILE;
use crate::config::ProjectPaths;
use crate::execution::executor::RUN_MANIFEST_FILE;
use crate::rounds::RoundName;
use crate::shared::fs_atomic::{absolutize, read_json_tolerant, JsonReadOutcome};
use crate::shared::ids::validate_path_component;
use crate::state::{FileStateStore, RoundStatusMap, StateStore};
use crate::workflow::WORKFLOW_RESULT_FILE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Workflow,
    Codex,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_type: RunKind,
    pub status: String,
    pub created_at: Option<String>,
    pub path: PathBuf,
    pub summary: Map<String, Value>,
}

fn first_timestamp(payload: &Map<String, Value>) -> Option<String> {
    ["started_at", "created_at", "finished_at"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn read_object(path: &Path) -> Option<Map<String, Value>> {
    match read_json_tolerant::<Value>(path) {
        JsonReadOutcome::Loaded(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn unknown_record(run_id: String, path: PathBuf) -> RunRecord {
    RunRecord {
        run_id,
        run_type: RunKind::Unknown,
        status: "unknown".to_string(),
        created_at: None,
        path,
        summary: Map::new(),
    }
}

fn classify_run(run_id: String, run_dir: PathBuf) -> RunRecord {
    let workflow_path = run_dir.join(WORKFLOW_RESULT_FILE);
    if workflow_path.exists() {
        let Some(payload) = read_object(&workflow_path) else {
            return unknown_record(run_id, run_dir);
        };
        let round_count = payload
            .get("rounds")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let summary = json!({
            "round_count": round_count,
            "workflow_result_path": workflow_path.display().to_string(),
        });
        return RunRecord {
            run_id,
            run_type: RunKind::Workflow,
            status: payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            created_at: first_timestamp(&payload),
            path: run_dir,
            summary: summary.as_object().cloned().unwrap_or_default(),
        };
    }

    let manifest_path = run_dir.join(RUN_MANIFEST_FILE);
    if manifest_path.exists() {
        let Some(payload) = read_object(&manifest_path) else {
            return unknown_record(run_id, run_dir);
        };
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let summary = json!({
            "final_exit_code": payload.get("final_exit_code").cloned().unwrap_or(Value::Null),
            "attempts": payload.get("attempts").and_then(Value::as_array).map_or(0, Vec::len),
            "run_manifest_path": manifest_path.display().to_string(),
        });
        return RunRecord {
            run_id,
            run_type: RunKind::Codex,
            status: if success { "succeeded" } else { "failed" }.to_string(),
            created_at: first_timestamp(&payload),
            path: run_dir,
            summary: summary.as_object().cloned().unwrap_or_default(),
        };
    }

    unknown_record(run_id, run_dir)
}

/// Every run directory under `runs/`, newest first by run id.
pub fn list_runs(project_root: &Path) -> Result<Vec<RunRecord>, HistoryError> {
    let root = absolutize(project_root).map_err(|e| io_error(project_root, e))?;
    let runs_dir = ProjectPaths::new(&root).runs_dir();
    let entries = match fs::read_dir(&runs_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(&runs_dir, err)),
    };

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(&runs_dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let run_id = entry.file_name().to_string_lossy().to_string();
        records.push(classify_run(run_id, path));
    }
    records.sort_by(|a, b| b.run_id.cmp(&a.run_id));
    Ok(records)
}

/// The newest readable `workflow_result.json`, if any.
pub fn latest_workflow_result(project_root: &Path) -> Result<Option<Value>, HistoryError> {
    Ok(list_runs(project_root)?
        .into_iter()
        .filter(|record| record.run_type == RunKind::Workflow)
        .find_map(|record| read_object(&record.path.join(WORKFLOW_RESULT_FILE)))
        .map(Value::Object))
}

pub fn load_round_status(project_root: &Path) -> Result<RoundStatusMap, HistoryError> {
    let root = absolutize(project_root).map_err(|e| io_error(project_root, e))?;
    Ok(FileStateStore::new(root).load_round_status())
}

/// Where a workflow round left its patch: `runs/<workflow_run_id>/<round>/`
/// for round0, otherwise the directory of the codex run recorded for that
/// round in `workflow_result.json`.
fn round_patch_path(
    paths: &ProjectPaths,
    run_dir: &Path,
    round: RoundName,
    recorded_rounds: &[Value],
) -> Option<PathBuf> {
    let nested = run_dir.join(round.as_str()).join(PATCH_FILE);
    if nested.is_file() {
        return Some(nested);
    }
    recorded_rounds
        .iter()
        .rev()
        .filter(|entry| entry.get("round_name").and_then(Value::as_str) == Some(round.as_str()))
        .filter_map(|entry| entry.get("codex_run_id").and_then(Value::as_str))
        .filter_map(|codex_run_id| validate_path_component("codex_run_id", codex_run_id).ok())
        .map(|codex_run_id| paths.run_dir(&codex_run_id).join(PATCH_FILE))
        .find(|candidate| candidate.is_file())
}

/// The patch of `round_name` within workflow run `run_id` when a round is
/// given; otherwise a patch directly in the run directory (a codex run),
/// else the patch of the latest round recorded in the run's workflow result.
pub fn resolve_patch_path(
    project_root: &Path,
    run_id: &str,
    round_name: Option<&str>,
) -> Result<Option<PathBuf>, HistoryError> {
    let run_id = validate_path_component("run_id", run_id).map_err(|reason| {
        HistoryError::InvalidId {
            kind: "run_id",
            reason,
        }
    })?;
    let round = match round_name {
        Some(raw) => Some(RoundName::parse(raw).map_err(|reason| HistoryError::InvalidId {
            kind: "round_name",
            reason,
        })?),
        None => None,
    };

    let root = absolutize(project_root).map_err(|e| io_error(project_root, e))?;
    let paths = ProjectPaths::new(&root);
    let run_dir = paths.run_dir(&run_id);
    if !run_dir.is_dir() {
        return Ok(None);
    }

    let recorded_rounds = read_object(&run_dir.join(WORKFLOW_RESULT_FILE))
        .and_then(|payload| payload.get("rounds").and_then(Value::as_array).cloned())
        .unwrap_or_default();

    if let Some(round) = round {
        return Ok(round_patch_path(&paths, &run_dir, round, &recorded_rounds));
    }

    let direct = run_dir.join(PATCH_FILE);
    if direct.is_file() {
        return Ok(Some(direct));
    }

    Ok(recorded_rounds
        .iter()
        .rev()
        .filter_map(|entry| entry.get("round_name").and_then(Value::as_str))
        .filter_map(|name| RoundName::parse(name).ok())
        .find_map(|round| round_patch_path(&paths, &run_dir, round, &recorded_rounds)))
}

/// Patch text, with invalid UTF-8 replaced.
pub fn read_patch(
    project_root: &Path,
    run_id: &str,
    round_name: Option<&str>,
) -> Result<Option<String>, HistoryError> {
    let Some(path) = resolve_patch_path(project_root, run_id, round_name)? else {
        return Ok(None);
    };
    let raw = fs::read(&path).map_err(|e| io_error(&path, e))?;
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}
