use crate::shared::clock::compact_utc_timestamp;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Accepts a caller-supplied identifier only if it is usable as exactly one
/// directory entry name.
pub fn validate_path_component(kind: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{kind} cannot be empty"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(format!("{kind} must be a single path component"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(format!("{kind} cannot be '.' or '..'"));
    }
    Ok(trimmed.to_string())
}

/// Resolves `relative_path` below `root`, returning `None` for anything that
/// is absolute, contains `.`/`..`/empty segments, or lands outside `root`
/// once symlinks are resolved.
pub fn resolve_within_root(root: &Path, relative_path: &str) -> Option<PathBuf> {
    if relative_path.is_empty() || relative_path.contains('\\') || relative_path.contains('\0') {
        return None;
    }
    if relative_path
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return None;
    }
    let relative = Path::new(relative_path);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return None;
    }

    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let candidate = root.join(relative);
    match fs::canonicalize(&candidate) {
        Ok(resolved) if resolved.starts_with(&root) => Some(resolved),
        Ok(_) => None,
        Err(_) => {
            let parent = candidate.parent()?;
            match fs::canonicalize(parent) {
                Ok(resolved_parent) if !resolved_parent.starts_with(&root) => None,
                _ => Some(candidate),
            }
        }
    }
}

fn random_suffix(kind: &str) -> Result<String, String> {
    let mut bytes = [0_u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("failed to generate {kind} id randomness: {err}"))?;
    Ok(hex::encode(bytes))
}

/// `<prefix>_<YYYYmmddTHHMMSSZ>_<8 hex>`.
pub fn generate_timestamped_id(prefix: &str) -> Result<String, String> {
    Ok(format!(
        "{prefix}_{}_{}",
        compact_utc_timestamp(),
        random_suffix(prefix)?
    ))
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_path_component($kind, raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<Path> for $name {
            fn as_ref(&self) -> &Path {
                Path::new(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(RunId, "run_id");
define_id_type!(WorkflowRunId, "workflow_run_id");
define_id_type!(SnapshotId, "snapshot_id");

impl RunId {
    pub fn generate() -> Result<Self, String> {
        generate_timestamped_id("run").map(Self)
    }
}

impl WorkflowRunId {
    pub fn generate() -> Result<Self, String> {
        generate_timestamped_id("workflow").map(Self)
    }
}

impl SnapshotId {
    /// `<YYYYmmddTHHMMSSZ>_<8 hex>`, so snapshots taken within the same
    /// second do not collide.
    pub fn generate() -> Result<Self, String> {
        Ok(Self(format!(
            "{}_{}",
            compact_utc_timestamp(),
            random_suffix("snapshot")?
        )))
    }
}
