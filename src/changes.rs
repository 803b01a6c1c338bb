use crate::shared::fs_atomic::{absolutize, atomic_write_file, write_json_atomic, JsonWriteError};
use crate::shared::ids::resolve_within_root;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const PATCH_FILE: &str = "changes.patch";
pub const NOTES_SNAPSHOT_DIR: &str = "notes_snapshot";
pub const DELETED_FILES_MANIFEST: &str = "deleted_files.json";
pub const DIFF_SUMMARY_FILE: &str = "diff_summary.json";

/// Relative path (`/`-separated) to full text content.
pub type TextState = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("changed path escapes notes root: {path}")]
    InvalidPath { path: String },
    #[error(transparent)]
    Json(#[from] JsonWriteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub changed_files: usize,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub changed_lines: usize,
    pub changed_rel_paths: Vec<String>,
    pub patch_path: PathBuf,
    pub notes_snapshot_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct DeletedFiles<'a> {
    deleted_files: &'a [String],
}

/// Text content of every regular file under `root`. Symlinks are kept only
/// when they resolve to a regular file inside `root`; symlinked directories
/// are never descended.
pub fn capture_state(root: &Path) -> Result<TextState, DiffError> {
    let mut state = TextState::new();
    let Ok(root) = fs::canonicalize(root) else {
        return Ok(state);
    };

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| DiffError::Walk {
            path: root.display().to_string(),
            source,
        })?;
        let file_type = entry.file_type();
        let included = if file_type.is_file() {
            true
        } else if file_type.is_symlink() {
            fs::canonicalize(entry.path())
                .map(|target| target.starts_with(&root) && target.is_file())
                .unwrap_or(false)
        } else {
            false
        };
        if !included {
            continue;
        }

        let Some(rel) = relative_key(&root, entry.path()) else {
            continue;
        };
        let bytes = fs::read(entry.path()).map_err(|e| io_error(entry.path(), e))?;
        state.insert(rel, String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(state)
}

/// Writes `changes.patch`, a `notes_snapshot/` copy of every changed file
/// still present, `deleted_files.json` when files disappeared, and
/// `diff_summary.json` into `run_dir`.
pub fn write_diff_artifacts(
    notes_root: &Path,
    before: &TextState,
    after: &TextState,
    run_dir: &Path,
) -> Result<DiffSummary, DiffError> {
    let notes = absolutize(notes_root).map_err(|e| io_error(notes_root, e))?;
    fs::create_dir_all(run_dir).map_err(|e| io_error(run_dir, e))?;
    let run_path = absolutize(run_dir).map_err(|e| io_error(run_dir, e))?;

    let changed_paths: Vec<String> = before
        .keys()
        .chain(after.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|rel| before.get(*rel) != after.get(*rel))
        .cloned()
        .collect();

    let mut patch = String::new();
    let mut added_lines = 0;
    let mut removed_lines = 0;
    for rel in &changed_paths {
        let old_text = before.get(rel).map(String::as_str).unwrap_or_default();
        let new_text = after.get(rel).map(String::as_str).unwrap_or_default();
        let diff = TextDiff::from_lines(old_text, new_text);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added_lines += 1,
                ChangeTag::Delete => removed_lines += 1,
                ChangeTag::Equal => {}
            }
        }
        patch.push_str(
            &diff
                .unified_diff()
                .context_radius(3)
                .header(&format!("a/{rel}"), &format!("b/{rel}"))
                .to_string(),
        );
    }

    let patch_path = run_path.join(PATCH_FILE);
    atomic_write_file(&patch_path, patch.as_bytes()).map_err(|e| io_error(&patch_path, e))?;

    let snapshot_path = run_path.join(NOTES_SNAPSHOT_DIR);
    fs::create_dir_all(&snapshot_path).map_err(|e| io_error(&snapshot_path, e))?;
    let mut deleted_files = Vec::new();
    for rel in &changed_paths {
        let Some(source) = resolve_within_root(&notes, rel) else {
            return Err(DiffError::InvalidPath { path: rel.clone() });
        };
        if !source.is_file() {
            deleted_files.push(rel.clone());
            continue;
        }
        let destination = snapshot_path.join(rel);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        fs::copy(&source, &destination).map_err(|e| io_error(&source, e))?;
    }
    if !deleted_files.is_empty() {
        write_json_atomic(
            &snapshot_path.join(DELETED_FILES_MANIFEST),
            &DeletedFiles {
                deleted_files: &deleted_files,
            },
        )?;
    }

    let summary = DiffSummary {
        changed_files: changed_paths.len(),
        added_lines,
        removed_lines,
        changed_lines: added_lines + removed_lines,
        changed_rel_paths: changed_paths,
        patch_path,
        notes_snapshot_path: snapshot_path,
    };
    write_json_atomic(&run_path.join(DIFF_SUMMARY_FILE), &summary)?;
    Ok(summary)
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn io_error(path: &Path, source: std::io::Error) -> DiffError {
    DiffError::Io {
        path: path.display().to_string(),
        source,
    }
}
