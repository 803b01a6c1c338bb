pub mod templates;

use crate::config::project_file::{DEFAULT_HUMAN_REVIEW_TIMING, DEFAULT_LANGUAGE};
use crate::config::{ProjectConfig, ProjectPaths, ReviewGranularity, CHECK_SCRIPT_REL_PATH};
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::absolutize;
use crate::shared::logging::{append_engine_log, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use templates::{render_manifest, scaffold_files, ManifestFields};

pub const DEFAULT_COURSE_ID: &str = "unknown-course";
pub const ROUND0_INIT_RESULT_FILE: &str = "round0_init_result.json";

#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> ScaffoldError {
    ScaffoldError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Course settings written into the scaffold's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldRequest {
    pub project_root: PathBuf,
    pub notes_root: PathBuf,
    pub course_id: Option<String>,
    pub language: String,
    pub review_granularity: ReviewGranularity,
    pub human_review_timing: String,
}

impl ScaffoldRequest {
    pub fn new(project_root: impl Into<PathBuf>, notes_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            notes_root: notes_root.into(),
            course_id: None,
            language: DEFAULT_LANGUAGE.to_string(),
            review_granularity: ReviewGranularity::default(),
            human_review_timing: DEFAULT_HUMAN_REVIEW_TIMING.to_string(),
        }
    }

    /// Request carrying the project's course settings, targeting `notes_root`.
    pub fn from_config(config: &ProjectConfig, notes_root: &Path) -> Self {
        Self {
            project_root: config.project_root.clone(),
            notes_root: notes_root.to_path_buf(),
            course_id: Some(config.course_id.clone()),
            language: config.language.clone(),
            review_granularity: config.review_granularity,
            human_review_timing: config.human_review_timing.clone(),
        }
    }

    pub fn with_course_id(mut self, course_id: Option<String>) -> Self {
        self.course_id = course_id.filter(|value| !value.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldReport {
    pub notes_root: PathBuf,
    pub created_files: Vec<String>,
    pub updated_files: Vec<String>,
    pub skipped_files: Vec<String>,
}

/// Prepares the notes root before any generation round runs.
pub trait Scaffolder {
    fn initialize(&self, request: &ScaffoldRequest) -> Result<ScaffoldReport, ScaffoldError>;
}

/// Writes the bundled template set. Existing files are left alone unless
/// `force` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateScaffolder {
    force: bool,
    enable_flashcards: bool,
}

impl Default for TemplateScaffolder {
    fn default() -> Self {
        Self {
            force: false,
            enable_flashcards: true,
        }
    }
}

impl TemplateScaffolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_flashcards(mut self, enabled: bool) -> Self {
        self.enable_flashcards = enabled;
        self
    }
}

impl Scaffolder for TemplateScaffolder {
    fn initialize(&self, request: &ScaffoldRequest) -> Result<ScaffoldReport, ScaffoldError> {
        let project = absolutize(&request.project_root)
            .map_err(|e| io_error(&request.project_root, e))?;
        fs::create_dir_all(&request.notes_root).map_err(|e| io_error(&request.notes_root, e))?;
        let notes =
            absolutize(&request.notes_root).map_err(|e| io_error(&request.notes_root, e))?;

        let now = now_rfc3339();
        let manifest = render_manifest(&ManifestFields {
            course_id: request.course_id.as_deref().unwrap_or(DEFAULT_COURSE_ID),
            language: &request.language,
            review_granularity: request.review_granularity,
            human_review_timing: &request.human_review_timing,
            generated_at: &now,
        });

        let mut report = ReportBuilder::default();
        for (rel_path, content) in scaffold_files(manifest, self.enable_flashcards) {
            let path = notes.join(rel_path);
            let existed = path.exists();
            if existed && !self.force {
                report.skipped(&path);
                continue;
            }
            write_file(&path, &content)?;
            if existed {
                report.updated(&path);
            } else {
                report.created(&path);
            }
        }

        let check_script = notes.join(CHECK_SCRIPT_REL_PATH);
        if check_script.exists() {
            make_executable(&check_script)?;
            report.skipped_unless_written(&check_script);
        }

        let marker = ProjectPaths::new(&project).round0_marker_file();
        let marker_existed = marker.exists();
        if !marker_existed || self.force {
            write_file(&marker, &format!("{now}\n"))?;
            if marker_existed {
                report.updated(&marker);
            } else {
                report.created(&marker);
            }
        } else {
            report.skipped(&marker);
        }

        let report = report.finish(notes);
        append_engine_log(
            &project,
            LogLevel::Info,
            "round0_initialized",
            &format!(
                "created={} updated={} skipped={}",
                report.created_files.len(),
                report.updated_files.len(),
                report.skipped_files.len()
            ),
        );
        Ok(report)
    }
}

#[derive(Default)]
struct ReportBuilder {
    created: Vec<String>,
    updated: Vec<String>,
    skipped: Vec<String>,
}

impl ReportBuilder {
    fn created(&mut self, path: &Path) {
        push_unique(&mut self.created, path);
    }

    fn updated(&mut self, path: &Path) {
        push_unique(&mut self.updated, path);
    }

    fn skipped(&mut self, path: &Path) {
        push_unique(&mut self.skipped, path);
    }

    fn skipped_unless_written(&mut self, path: &Path) {
        let key = path.display().to_string();
        if !self.created.contains(&key) && !self.updated.contains(&key) {
            push_unique(&mut self.skipped, path);
        }
    }

    fn finish(self, notes_root: PathBuf) -> ScaffoldReport {
        ScaffoldReport {
            notes_root,
            created_files: self.created,
            updated_files: self.updated,
            skipped_files: self.skipped,
        }
    }
}

fn push_unique(list: &mut Vec<String>, path: &Path) {
    let key = path.display().to_string();
    if !list.contains(&key) {
        list.push(key);
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ScaffoldError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    fs::write(path, content).map_err(|e| io_error(path, e))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ScaffoldError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ScaffoldError> {
    Ok(())
}
