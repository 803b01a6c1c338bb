use crate::shared::fs_atomic::JsonWriteError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod create;
pub mod verify;

pub use create::{create_snapshot, SnapshotRequest};
pub use verify::verify_snapshot_hashes;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("sources cannot be empty")]
    EmptySources,
    #[error("{0}")]
    InvalidSnapshotId(String),
    #[error("source not found: {path}")]
    SourceNotFound { path: String },
    #[error("symlinks are not allowed in snapshot sources: {path}")]
    SymlinkSource { path: String },
    #[error("snapshot already exists: {path}")]
    AlreadyExists { path: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Json(#[from] JsonWriteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub snapshot_id: String,
    pub snapshot_root: PathBuf,
    pub source_index_path: PathBuf,
    pub source_hashes_path: PathBuf,
    pub source_count: usize,
    pub file_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndexEntry {
    pub source_id: String,
    pub source_path: PathBuf,
    pub source_type: SourceType,
    pub snapshot_path: PathBuf,
    pub snapshot_rel_path: String,
    pub lecture: Option<String>,
    pub file_count: usize,
}

/// `artifacts/source_index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndex {
    pub snapshot_id: String,
    pub generated_at: String,
    pub project_root: PathBuf,
    pub sources: Vec<SourceIndexEntry>,
}

/// `artifacts/source_hashes.json`: project-relative path to SHA-256 hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHashes {
    pub snapshot_id: String,
    pub generated_at: String,
    pub project_root: PathBuf,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchReason {
    Missing,
    HashMismatch,
    InvalidPath,
    InvalidMetadata,
    MissingMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashMismatch {
    pub path: String,
    pub reason: MismatchReason,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVerificationResult {
    pub snapshot_id: String,
    pub valid: bool,
    pub checked_files: usize,
    pub mismatches: Vec<HashMismatch>,
}

pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub(crate) fn io_error(path: &Path, source: io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.display().to_string(),
        source,
    }
}
