use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Canonical form of `path` when it exists, otherwise its absolute form
/// relative to the current directory.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => std::path::absolute(path),
        Err(err) => Err(err),
    }
}

/// Replaces `path` with `content` through a sibling temp file and a rename,
/// so readers observe either the previous or the new document in full.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))?;
    fs::create_dir_all(parent)?;
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|v| v.to_str()).unwrap_or("state"),
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    let tmp_path = parent.join(tmp_name);

    let written = (|| {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    sync_parent_dir(parent)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum JsonWriteError {
    #[error("failed to encode json for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), JsonWriteError> {
    let mut body = serde_json::to_vec_pretty(value).map_err(|source| JsonWriteError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    body.push(b'\n');
    atomic_write_file(path, &body).map_err(|source| JsonWriteError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Outcome of a tolerant JSON read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonReadOutcome<T> {
    Loaded(T),
    Missing,
    Invalid { reason: String },
}

/// Reads a JSON document without failing on absent or corrupt files.
pub fn read_json_tolerant<T: DeserializeOwned>(path: &Path) -> JsonReadOutcome<T> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return JsonReadOutcome::Missing,
        Err(err) => {
            return JsonReadOutcome::Invalid {
                reason: err.to_string(),
            }
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(value) => JsonReadOutcome::Loaded(value),
        Err(err) => JsonReadOutcome::Invalid {
            reason: err.to_string(),
        },
    }
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> std::io::Result<()> {
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_parent: &Path) -> std::io::Result<()> {
    Ok(())
}
