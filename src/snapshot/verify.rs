use super::{file_sha256, HashMismatch, MismatchReason, SnapshotVerificationResult};
use crate::config::ProjectPaths;
use crate::shared::fs_atomic::{read_json_tolerant, JsonReadOutcome};
use crate::shared::ids::resolve_within_root;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const UNKNOWN_SNAPSHOT: &str = "unknown";

/// Recomputes every digest recorded in `artifacts/source_hashes.json`.
/// Problems are reported as mismatches; nothing outside `project_root` is
/// ever read.
pub fn verify_snapshot_hashes(project_root: &Path) -> SnapshotVerificationResult {
    let root = fs::canonicalize(project_root).unwrap_or_else(|_| project_root.to_path_buf());
    let hashes_path = ProjectPaths::new(&root).source_hashes_file();
    let display_path = hashes_path.display().to_string();

    let payload = match read_json_tolerant::<Value>(&hashes_path) {
        JsonReadOutcome::Loaded(payload) => payload,
        JsonReadOutcome::Missing => {
            return metadata_failure(display_path, MismatchReason::MissingMetadata, "")
        }
        JsonReadOutcome::Invalid { reason } => {
            return metadata_failure(display_path, MismatchReason::InvalidMetadata, &reason)
        }
    };

    let snapshot_id = payload
        .get("snapshot_id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_SNAPSHOT)
        .to_string();
    let empty = serde_json::Map::new();
    let files = match payload.get("files") {
        None => &empty,
        Some(Value::Object(files)) => files,
        Some(_) => {
            return metadata_failure(
                display_path,
                MismatchReason::InvalidMetadata,
                "`files` must be an object",
            )
        }
    };

    let mut mismatches = Vec::new();
    for (relative_path, expected) in files {
        let expected = match expected {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let Some(file_path) = resolve_within_root(&root, relative_path) else {
            mismatches.push(HashMismatch {
                path: relative_path.clone(),
                reason: MismatchReason::InvalidPath,
                expected,
                actual: String::new(),
            });
            continue;
        };

        let path = file_path.display().to_string();
        match file_sha256(&file_path) {
            Ok(actual) if actual == expected => {}
            Ok(actual) => mismatches.push(HashMismatch {
                path,
                reason: MismatchReason::HashMismatch,
                expected,
                actual,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => mismatches.push(HashMismatch {
                path,
                reason: MismatchReason::Missing,
                expected,
                actual: String::new(),
            }),
            Err(_) => mismatches.push(HashMismatch {
                path,
                reason: MismatchReason::HashMismatch,
                expected,
                actual: String::new(),
            }),
        }
    }

    SnapshotVerificationResult {
        snapshot_id,
        valid: mismatches.is_empty(),
        checked_files: files.len(),
        mismatches,
    }
}

fn metadata_failure(
    path: String,
    reason: MismatchReason,
    detail: &str,
) -> SnapshotVerificationResult {
    SnapshotVerificationResult {
        snapshot_id: UNKNOWN_SNAPSHOT.to_string(),
        valid: false,
        checked_files: 0,
        mismatches: vec![HashMismatch {
            path,
            reason,
            expected: String::new(),
            actual: detail.to_string(),
        }],
    }
}
