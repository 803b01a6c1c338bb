use crate::app::command_support::{load_project, map_err, to_json_output, CommandArgs};
use crate::config::ReviewGranularity;
use crate::project::{create_project, discover_workspace_projects, CreateProjectRequest};
use std::path::PathBuf;

pub fn cmd_create_project(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &[
            "course-id",
            "workspace-root",
            "project-root",
            "notes-root",
            "language",
            "review-granularity",
            "max-changed-lines",
            "max-changed-files",
        ],
        &["pause-after-each-round", "allow-existing"],
    )?;

    let mut request = CreateProjectRequest::new(args.required("course-id")?);
    if let Some(root) = args.path("workspace-root") {
        request = request.with_workspace_root(root);
    }
    if let Some(root) = args.path("project-root") {
        request = request.with_project_root(root);
    }
    if let Some(root) = args.path("notes-root") {
        request = request.with_notes_root(root);
    }
    if let Some(language) = args.value("language") {
        request = request.with_language(language);
    }
    if let Some(raw) = args.value("review-granularity") {
        let granularity = ReviewGranularity::parse(raw)
            .map_err(|e| format!("invalid value for --review-granularity: {e}"))?;
        request = request.with_review_granularity(granularity);
    }
    let max_changed_lines = args
        .parsed::<i64>("max-changed-lines")?
        .unwrap_or(request.max_changed_lines);
    let max_changed_files = args
        .parsed::<i64>("max-changed-files")?
        .unwrap_or(request.max_changed_files);
    request = request
        .with_thresholds(max_changed_lines, max_changed_files)
        .with_pause_after_each_round(args.switch("pause-after-each-round"));

    let config = create_project(&request, args.switch("allow-existing")).map_err(map_err)?;
    to_json_output(&config)
}

pub fn cmd_show_project(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["project-root"], &[])?;
    let config = load_project(&args)?;
    to_json_output(&config)
}

pub fn cmd_list_projects(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["workspace-root"], &[])?;
    let workspace_root = PathBuf::from(args.required("workspace-root")?);
    let projects = discover_workspace_projects(&workspace_root).map_err(map_err)?;
    to_json_output(&projects)
}
