pub mod error;
pub mod paths;
pub mod project_file;

pub use error::ConfigError;
pub use paths::{
    check_script_path, feedback_file_path, ProjectPaths, ARTIFACTS_DIR_NAME,
    CHECK_SCRIPT_REL_PATH, FEEDBACK_REL_PATH, PROJECT_CONFIG_FILE, RUNS_DIR_NAME, STATE_DIR_NAME,
};
pub use project_file::{threshold_from_config, ProjectConfig, ReviewGranularity};

use std::path::Path;

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    let config = ProjectConfig::from_path(&ProjectPaths::new(project_root).config_file())?;
    config.validate()?;
    Ok(config)
}
