use crate::app::command_support::{load_project, map_err, to_json_output, CommandArgs};
use crate::feedback::append_feedback;
use crate::history::{list_runs, load_round_status, read_patch, resolve_patch_path};
use serde_json::json;

pub fn cmd_list_runs(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["project-root"], &[])?;
    let runs = list_runs(&args.project_root()?).map_err(map_err)?;
    to_json_output(&runs)
}

pub fn cmd_show_patch(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["project-root", "run-id", "round"], &[])?;
    let project_root = args.project_root()?;
    let run_id = args.required("run-id")?;
    let round = args.value("round");

    let patch_path = resolve_patch_path(&project_root, run_id, round).map_err(map_err)?;
    let patch = read_patch(&project_root, run_id, round).map_err(map_err)?;
    let (Some(patch_path), Some(patch)) = (patch_path, patch) else {
        return Err(match round {
            Some(round) => format!("no patch for run `{run_id}` round `{round}`"),
            None => format!("no patch for run `{run_id}`"),
        });
    };
    to_json_output(&json!({
        "run_id": run_id,
        "round_name": round,
        "patch_path": patch_path,
        "patch": patch,
    }))
}

pub fn cmd_round_status(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(args, &["project-root"], &[])?;
    let statuses = load_round_status(&args.project_root()?).map_err(map_err)?;
    to_json_output(&statuses)
}

pub fn cmd_add_feedback(args: &[String]) -> Result<String, String> {
    let args = CommandArgs::parse(
        args,
        &["project-root", "notes-root", "item", "title", "author"],
        &[],
    )?;
    let notes_root = match args.path("notes-root") {
        Some(notes_root) => notes_root,
        None => load_project(&args)?.notes_root,
    };
    let result = append_feedback(
        &notes_root,
        args.values("item"),
        args.value("title"),
        args.value("author"),
    )
    .map_err(map_err)?;
    to_json_output(&result)
}
