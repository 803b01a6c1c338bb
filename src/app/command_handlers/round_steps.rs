use crate::app::command_support::{load_project, map_err, to_json_output, CommandArgs};
use crate::execution::{CodexExecutor, CodexRunRequest, Executor};
use crate::scaffold::{ScaffoldRequest, Scaffolder, TemplateScaffolder};
use crate::verification::{CheckRunner, Checker};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub fn cmd_run_codex(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &[
            "project-root",
            "notes-root",
            "prompt",
            "prompt-file",
            "run-id",
            "model",
            "max-retries",
        ],
        &["search"],
    )?;
    let config = load_project(&args)?;
    let prompt = match (args.value("prompt"), args.path("prompt-file")) {
        (Some(prompt), None) => prompt.to_string(),
        (None, Some(path)) => fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
        (Some(_), Some(_)) => return Err("use either --prompt or --prompt-file".to_string()),
        (None, None) => return Err("missing required flag --prompt".to_string()),
    };

    let notes_root = args.path("notes-root").unwrap_or(config.notes_root);
    let mut request = CodexRunRequest::new(&config.project_root, notes_root, prompt)
        .with_model(args.value("model").map(str::to_string))
        .with_search(args.switch("search"));
    if let Some(run_id) = args.value("run-id") {
        request = request.with_run_id(run_id);
    }
    if let Some(max_retries) = args.parsed::<i32>("max-retries")? {
        request = request.with_max_retries(max_retries);
    }

    let result = CodexExecutor::new().run(&request).map_err(map_err)?;
    to_json_output(&result)
}

pub fn cmd_init_round0(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &["project-root", "notes-root", "course-id"],
        &["force", "no-flashcards"],
    )?;
    let config = load_project(&args)?;
    let notes_root = args
        .path("notes-root")
        .unwrap_or_else(|| config.notes_root.clone());
    let mut request = ScaffoldRequest::from_config(&config, &notes_root);
    if let Some(course_id) = args.value("course-id") {
        request = request.with_course_id(Some(course_id.to_string()));
    }

    let report = TemplateScaffolder::new()
        .with_force(args.switch("force"))
        .with_flashcards(!args.switch("no-flashcards"))
        .initialize(&request)
        .map_err(map_err)?;
    to_json_output(&report)
}

pub fn cmd_run_check(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &["project-root", "notes-root", "output", "timeout-seconds"],
        &[],
    )?;
    let config = load_project(&args)?;
    let notes_root = args.path("notes-root").unwrap_or(config.notes_root);
    let mut runner = CheckRunner::new();
    if let Some(seconds) = args.parsed::<u64>("timeout-seconds")? {
        runner = runner.with_timeout(Duration::from_secs(seconds));
    }
    let output: Option<PathBuf> = args.path("output");

    let result = runner
        .run(&config.project_root, &notes_root, output.as_deref())
        .map_err(map_err)?;
    to_json_output(&result)
}
