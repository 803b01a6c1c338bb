use super::{
    file_sha256, io_error, SnapshotError, SnapshotResult, SourceHashes, SourceIndex,
    SourceIndexEntry, SourceType,
};
use crate::config::ProjectPaths;
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::{absolutize, write_json_atomic};
use crate::shared::ids::SnapshotId;
use crate::shared::logging::{append_engine_log, LogLevel};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub project_root: PathBuf,
    pub sources: Vec<PathBuf>,
    /// Source path to lecture label.
    pub lecture_mapping: BTreeMap<PathBuf, String>,
    pub snapshot_id: Option<String>,
}

/// Copies every source into `artifacts/snapshots/<snapshot_id>/`, records
/// digests and the source index, then locks the copy read-only.
pub fn create_snapshot(request: &SnapshotRequest) -> Result<SnapshotResult, SnapshotError> {
    let snapshot_id = match &request.snapshot_id {
        Some(raw) => SnapshotId::parse(raw).map_err(SnapshotError::InvalidSnapshotId)?,
        None => SnapshotId::generate().map_err(SnapshotError::InvalidSnapshotId)?,
    };
    if request.sources.is_empty() {
        return Err(SnapshotError::EmptySources);
    }

    let root = fs::canonicalize(&request.project_root)
        .map_err(|e| io_error(&request.project_root, e))?;
    let sources = request
        .sources
        .iter()
        .map(|source| checked_source(source))
        .collect::<Result<Vec<_>, _>>()?;

    let paths = ProjectPaths::new(&root);
    let snapshots_dir = paths.snapshots_dir();
    fs::create_dir_all(&snapshots_dir).map_err(|e| io_error(&snapshots_dir, e))?;
    let snapshot_root = snapshots_dir.join(snapshot_id.as_str());
    match fs::create_dir(&snapshot_root) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(SnapshotError::AlreadyExists {
                path: snapshot_root.display().to_string(),
            })
        }
        Err(err) => return Err(io_error(&snapshot_root, err)),
    }

    let lectures: BTreeMap<PathBuf, &String> = request
        .lecture_mapping
        .iter()
        .filter_map(|(path, lecture)| absolutize(path).ok().map(|path| (path, lecture)))
        .collect();

    let generated_at = now_rfc3339();
    let mut index_entries = Vec::new();
    let mut files = BTreeMap::new();
    for (position, source) in sources.iter().enumerate() {
        let idx = position + 1;
        let dest = snapshot_root.join(format!("{idx:03}_{}", safe_name(source)));
        let source_type = if source.is_dir() {
            copy_tree(source, &dest)?;
            SourceType::Dir
        } else {
            fs::copy(source, &dest).map_err(|e| io_error(source, e))?;
            SourceType::File
        };

        let hashes = collect_hashes(&root, &dest)?;
        let file_count = hashes.len();
        files.extend(hashes);
        index_entries.push(SourceIndexEntry {
            source_id: format!("src_{idx:04}"),
            source_path: source.clone(),
            source_type,
            snapshot_rel_path: relative_key(&root, &dest).unwrap_or_default(),
            snapshot_path: dest,
            lecture: lectures.get(source).map(|lecture| (*lecture).clone()),
            file_count,
        });
    }

    set_read_only(&snapshot_root)?;

    let file_count = files.len();
    let source_index_path = paths.source_index_file();
    let source_hashes_path = paths.source_hashes_file();
    write_json_atomic(
        &source_index_path,
        &SourceIndex {
            snapshot_id: snapshot_id.to_string(),
            generated_at: generated_at.clone(),
            project_root: root.clone(),
            sources: index_entries,
        },
    )?;
    write_json_atomic(
        &source_hashes_path,
        &SourceHashes {
            snapshot_id: snapshot_id.to_string(),
            generated_at,
            project_root: root.clone(),
            files,
        },
    )?;

    append_engine_log(
        &root,
        LogLevel::Info,
        "snapshot_created",
        &format!(
            "snapshot {snapshot_id}: {} sources, {file_count} files",
            sources.len()
        ),
    );

    Ok(SnapshotResult {
        snapshot_id: snapshot_id.to_string(),
        snapshot_root,
        source_index_path,
        source_hashes_path,
        source_count: sources.len(),
        file_count,
    })
}

/// Rejects missing sources and any symlink at or below the source.
fn checked_source(source: &Path) -> Result<PathBuf, SnapshotError> {
    let absolute = std::path::absolute(source).map_err(|e| io_error(source, e))?;
    let metadata = match fs::symlink_metadata(&absolute) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SnapshotError::SourceNotFound {
                path: absolute.display().to_string(),
            })
        }
        Err(err) => return Err(io_error(&absolute, err)),
    };
    if metadata.file_type().is_symlink() {
        return Err(SnapshotError::SymlinkSource {
            path: absolute.display().to_string(),
        });
    }
    if metadata.is_dir() {
        for entry in WalkDir::new(&absolute).follow_links(false) {
            let entry = entry.map_err(|source| SnapshotError::Walk {
                path: absolute.display().to_string(),
                source,
            })?;
            if entry.path_is_symlink() {
                return Err(SnapshotError::SymlinkSource {
                    path: entry.path().display().to_string(),
                });
            }
        }
    }
    fs::canonicalize(&absolute).map_err(|e| io_error(&absolute, e))
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), SnapshotError> {
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| SnapshotError::Walk {
            path: source.display().to_string(),
            source: err,
        })?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_error(&target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| io_error(entry.path(), e))?;
        }
    }
    Ok(())
}

fn collect_hashes(root: &Path, copied: &Path) -> Result<BTreeMap<String, String>, SnapshotError> {
    let mut hashes = BTreeMap::new();
    for entry in WalkDir::new(copied).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| SnapshotError::Walk {
            path: copied.display().to_string(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_key(root, entry.path()) else {
            continue;
        };
        let digest = file_sha256(entry.path()).map_err(|e| io_error(entry.path(), e))?;
        hashes.insert(rel, digest);
    }
    Ok(hashes)
}

#[cfg(unix)]
fn set_read_only(snapshot_root: &Path) -> Result<(), SnapshotError> {
    use std::os::unix::fs::PermissionsExt;

    for entry in WalkDir::new(snapshot_root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|source| SnapshotError::Walk {
            path: snapshot_root.display().to_string(),
            source,
        })?;
        let mode = if entry.file_type().is_dir() { 0o555 } else { 0o444 };
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))
            .map_err(|e| io_error(entry.path(), e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_read_only(snapshot_root: &Path) -> Result<(), SnapshotError> {
    for entry in WalkDir::new(snapshot_root).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|source| SnapshotError::Walk {
            path: snapshot_root.display().to_string(),
            source,
        })?;
        let mut permissions = entry
            .metadata()
            .map_err(|source| SnapshotError::Walk {
                path: entry.path().display().to_string(),
                source,
            })?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(entry.path(), permissions).map_err(|e| io_error(entry.path(), e))?;
    }
    Ok(())
}

/// File name reduced to `[A-Za-z0-9._-]`, other characters mapped to `-`.
fn safe_name(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filtered: String = name
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = filtered.trim_matches('-');
    if trimmed.is_empty() {
        "source".to_string()
    } else {
        trimmed.to_string()
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_name_maps_unusual_characters() {
        assert_eq!(safe_name(Path::new("/x/Lecture 01 (draft).md")), "Lecture-01--draft-.md");
        assert_eq!(safe_name(Path::new("/x/---")), "source");
        assert_eq!(safe_name(Path::new("/x/讲义.pdf")), "讲义.pdf");
    }
}
