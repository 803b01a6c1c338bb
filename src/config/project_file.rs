use super::{ConfigError, ProjectPaths};
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::serde_ext::{deserialize_flexible_bool, parse_via_string};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LANGUAGE: &str = "zh-CN";
pub const DEFAULT_HUMAN_REVIEW_TIMING: &str = "final_only";
pub const DEFAULT_NETWORK_MODE: &str = "disabled_by_default";
pub const DEFAULT_MAX_CHANGED_LINES: i64 = 500;
pub const DEFAULT_MAX_CHANGED_FILES: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGranularity {
    Section,
    #[default]
    Lecture,
}

impl ReviewGranularity {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "section" => Ok(Self::Section),
            "lecture" => Ok(Self::Lecture),
            _ => Err("expected `section` or `lecture`".to_string()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Lecture => "lecture",
        }
    }
}

impl<'de> Deserialize<'de> for ReviewGranularity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_via_string(deserializer, "review_granularity", Self::parse)
    }
}

/// Contents of `<project_root>/project.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    pub course_id: String,
    pub project_root: PathBuf,
    pub notes_root: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub review_granularity: ReviewGranularity,
    #[serde(default = "default_human_review_timing")]
    pub human_review_timing: String,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub pause_after_each_round: bool,
    #[serde(default = "default_max_changed_lines")]
    pub max_changed_lines: i64,
    #[serde(default = "default_max_changed_files")]
    pub max_changed_files: i64,
    #[serde(default = "default_network_mode")]
    pub network_mode: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_human_review_timing() -> String {
    DEFAULT_HUMAN_REVIEW_TIMING.to_string()
}

fn default_network_mode() -> String {
    DEFAULT_NETWORK_MODE.to_string()
}

fn default_max_changed_lines() -> i64 {
    DEFAULT_MAX_CHANGED_LINES
}

fn default_max_changed_files() -> i64 {
    DEFAULT_MAX_CHANGED_FILES
}

/// A negative configured threshold disables that check.
pub fn threshold_from_config(value: i64) -> Option<u64> {
    u64::try_from(value).ok()
}

impl ProjectConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(&self.project_root)
    }

    pub fn changed_lines_threshold(&self) -> Option<u64> {
        threshold_from_config(self.max_changed_lines)
    }

    pub fn changed_files_threshold(&self) -> Option<u64> {
        threshold_from_config(self.max_changed_files)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let course_id = self.course_id.trim();
        if course_id.is_empty() {
            return Err(ConfigError::Project(
                "`course_id` must be non-empty".to_string(),
            ));
        }
        if !course_id
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        {
            return Err(ConfigError::Project(format!(
                "`course_id` must be a lowercase slug, got `{course_id}`"
            )));
        }
        if !self.project_root.is_absolute() {
            return Err(ConfigError::Project(
                "`project_root` must be an absolute path".to_string(),
            ));
        }
        if !self.notes_root.is_absolute() {
            return Err(ConfigError::Project(
                "`notes_root` must be an absolute path".to_string(),
            ));
        }
        if let Some(workspace_root) = &self.workspace_root {
            if !workspace_root.is_absolute() {
                return Err(ConfigError::Project(
                    "`workspace_root` must be an absolute path".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Validates and writes the config atomically to `project.yaml` under
    /// its own project root.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        self.validate()?;
        let path = self.paths().config_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let body = serde_yaml::to_string(self).map_err(|source| ConfigError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        atomic_write_file(&path, body.as_bytes()).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}
