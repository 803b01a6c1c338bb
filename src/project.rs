use crate::config::project_file::{
    DEFAULT_HUMAN_REVIEW_TIMING, DEFAULT_LANGUAGE, DEFAULT_MAX_CHANGED_FILES,
    DEFAULT_MAX_CHANGED_LINES, DEFAULT_NETWORK_MODE,
};
use crate::config::{
    load_project_config, ConfigError, ProjectConfig, ReviewGranularity,
    PROJECT_CONFIG_FILE,
};
use crate::shared::fs_atomic::absolutize;
use crate::state::FileStateStore;
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECTS_DIR_NAME: &str = "projects";
pub const NOTES_DIR_NAME: &str = "notes";

/// Lowercases `value` and collapses every run of non-alphanumerics into a
/// single `-`.
pub fn slugify_course_id(value: &str) -> Result<String, ConfigError> {
    let mut slug = String::new();
    for ch in value.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        return Err(ConfigError::Project(
            "course_id must contain at least one alphanumeric character".to_string(),
        ));
    }
    Ok(slug)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectRequest {
    pub course_id: String,
    pub workspace_root: Option<PathBuf>,
    pub project_root: Option<PathBuf>,
    pub notes_root: Option<PathBuf>,
    pub language: String,
    pub review_granularity: ReviewGranularity,
    pub human_review_timing: String,
    pub pause_after_each_round: bool,
    pub max_changed_lines: i64,
    pub max_changed_files: i64,
    pub network_mode: String,
}

impl CreateProjectRequest {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            workspace_root: None,
            project_root: None,
            notes_root: None,
            language: DEFAULT_LANGUAGE.to_string(),
            review_granularity: ReviewGranularity::default(),
            human_review_timing: DEFAULT_HUMAN_REVIEW_TIMING.to_string(),
            pause_after_each_round: false,
            max_changed_lines: DEFAULT_MAX_CHANGED_LINES,
            max_changed_files: DEFAULT_MAX_CHANGED_FILES,
            network_mode: DEFAULT_NETWORK_MODE.to_string(),
        }
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn with_notes_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.notes_root = Some(root.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_review_granularity(mut self, granularity: ReviewGranularity) -> Self {
        self.review_granularity = granularity;
        self
    }

    pub fn with_pause_after_each_round(mut self, pause: bool) -> Self {
        self.pause_after_each_round = pause;
        self
    }

    pub fn with_thresholds(mut self, max_changed_lines: i64, max_changed_files: i64) -> Self {
        self.max_changed_lines = max_changed_lines;
        self.max_changed_files = max_changed_files;
        self
    }
}

/// Partial update applied by [`update_project_config`]. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub notes_root: Option<PathBuf>,
    pub language: Option<String>,
    pub review_granularity: Option<ReviewGranularity>,
    pub human_review_timing: Option<String>,
    pub pause_after_each_round: Option<bool>,
    pub max_changed_lines: Option<i64>,
    pub max_changed_files: Option<i64>,
    pub network_mode: Option<String>,
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::CreateDir {
        path: path.display().to_string(),
        source,
    }
}

fn resolve_root(
    explicit: Option<&Path>,
    workspace_root: Option<&Path>,
    default_child: &str,
    root_name: &'static str,
) -> Result<PathBuf, ConfigError> {
    let candidate = match (explicit, workspace_root) {
        (Some(explicit), _) => explicit.to_path_buf(),
        (None, Some(workspace)) => workspace.join(default_child),
        (None, None) => return Err(ConfigError::MissingRoot { root_name }),
    };
    absolutize(&candidate).map_err(|e| io_error(&candidate, e))
}

fn resolve_config(request: &CreateProjectRequest) -> Result<ProjectConfig, ConfigError> {
    let course_id = slugify_course_id(&request.course_id)?;
    let workspace_root = match &request.workspace_root {
        Some(root) => Some(absolutize(root).map_err(|e| io_error(root, e))?),
        None => None,
    };
    let project_root = resolve_root(
        request.project_root.as_deref(),
        workspace_root.as_deref(),
        &format!("{PROJECTS_DIR_NAME}/{course_id}"),
        "project_root",
    )?;
    let notes_root = resolve_root(
        request.notes_root.as_deref(),
        workspace_root.as_deref(),
        &format!("{NOTES_DIR_NAME}/{course_id}"),
        "notes_root",
    )?;

    Ok(ProjectConfig {
        workspace_root,
        course_id,
        project_root,
        notes_root,
        language: request.language.clone(),
        review_granularity: request.review_granularity,
        human_review_timing: request.human_review_timing.clone(),
        pause_after_each_round: request.pause_after_each_round,
        max_changed_lines: request.max_changed_lines,
        max_changed_files: request.max_changed_files,
        network_mode: request.network_mode.clone(),
    })
}

/// Creates the project layout and config. Session and round-status documents
/// are only written when absent, so re-creating a project keeps its progress.
pub fn create_project(
    request: &CreateProjectRequest,
    allow_existing: bool,
) -> Result<ProjectConfig, ConfigError> {
    let config = resolve_config(request)?;
    let paths = config.paths();
    if paths.config_file().exists() && !allow_existing {
        return Err(ConfigError::AlreadyExists {
            path: config.project_root.display().to_string(),
        });
    }

    let mut directories = paths.required_directories();
    directories.push(config.notes_root.clone());
    for dir in directories {
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
    }
    config.save()?;

    FileStateStore::new(&config.project_root)
        .initialize_if_absent(&config.course_id)
        .map_err(|err| ConfigError::State {
            path: paths.state_dir().display().to_string(),
            reason: err.to_string(),
        })?;
    Ok(config)
}

pub fn update_project_config(
    project_root: &Path,
    update: ProjectUpdate,
) -> Result<ProjectConfig, ConfigError> {
    let mut config = load_project_config(project_root)?;
    if let Some(notes_root) = update.notes_root {
        config.notes_root = notes_root;
    }
    if let Some(language) = update.language {
        config.language = language;
    }
    if let Some(granularity) = update.review_granularity {
        config.review_granularity = granularity;
    }
    if let Some(timing) = update.human_review_timing {
        config.human_review_timing = timing;
    }
    if let Some(pause) = update.pause_after_each_round {
        config.pause_after_each_round = pause;
    }
    if let Some(lines) = update.max_changed_lines {
        config.max_changed_lines = lines;
    }
    if let Some(files) = update.max_changed_files {
        config.max_changed_files = files;
    }
    if let Some(mode) = update.network_mode {
        config.network_mode = mode;
    }

    config.project_root =
        absolutize(&config.project_root).map_err(|e| io_error(&config.project_root, e))?;
    config.notes_root =
        absolutize(&config.notes_root).map_err(|e| io_error(&config.notes_root, e))?;
    if let Some(workspace_root) = config.workspace_root.take() {
        config.workspace_root =
            Some(absolutize(&workspace_root).map_err(|e| io_error(&workspace_root, e))?);
    }
    config.save()?;
    Ok(config)
}

/// Every `projects/*/project.yaml` under `workspace_root`, sorted by path.
pub fn discover_workspace_projects(workspace_root: &Path) -> Result<Vec<ProjectConfig>, ConfigError> {
    let projects_dir = workspace_root.join(PROJECTS_DIR_NAME);
    let entries = match fs::read_dir(&projects_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: projects_dir.display().to_string(),
                source,
            })
        }
    };

    let mut config_files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path().join(PROJECT_CONFIG_FILE))
        .filter(|path| path.is_file())
        .collect();
    config_files.sort();

    config_files
        .iter()
        .map(|path| ProjectConfig::from_path(path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(
            slugify_course_id("  Intro to Algorithms!! 2026 ").expect("slug"),
            "intro-to-algorithms-2026"
        );
        assert_eq!(slugify_course_id("a__b").expect("slug"), "a-b");
        assert!(slugify_course_id("!!! ").is_err());
    }

    #[test]
    fn explicit_roots_win_over_workspace_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = CreateProjectRequest::new("Algo")
            .with_workspace_root(temp.path())
            .with_notes_root(temp.path().join("elsewhere/notes"));
        let config = resolve_config(&request).expect("resolve");
        assert!(config.project_root.ends_with("projects/algo"));
        assert!(config.notes_root.ends_with("elsewhere/notes"));
    }

    #[test]
    fn missing_workspace_and_root_is_reported_by_name() {
        let err = resolve_config(&CreateProjectRequest::new("algo")).expect_err("no roots");
        assert!(matches!(
            err,
            ConfigError::MissingRoot {
                root_name: "project_root"
            }
        ));
    }
}
