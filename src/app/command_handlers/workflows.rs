use crate::app::command_support::{map_err, to_json_output, CommandArgs};
use crate::rounds::RoundName;
use crate::workflow::{ResumeOptions, RunOptions, RunSettings, WorkflowOrchestrator};

const SETTINGS_VALUE_FLAGS: &[&str] = &[
    "project-root",
    "notes-root",
    "lecture",
    "model",
    "max-retries",
    "workflow-run-id",
    "pause-after-each-round",
    "max-changed-lines",
    "max-changed-files",
];
const SETTINGS_SWITCH_FLAGS: &[&str] = &["allow-external-refs", "search", "no-auto-repair"];

fn run_settings(args: &CommandArgs) -> Result<RunSettings, String> {
    let defaults = RunSettings::default();
    Ok(RunSettings {
        notes_root: args.path("notes-root"),
        target_lectures: args.values("lecture").to_vec(),
        allow_external_refs: args.switch("allow-external-refs"),
        search_enabled: args.switch("search"),
        model: args.value("model").map(str::to_string),
        max_retries: args
            .parsed::<i32>("max-retries")?
            .unwrap_or(defaults.max_retries),
        workflow_run_id: args.value("workflow-run-id").map(str::to_string),
        auto_repair: !args.switch("no-auto-repair"),
        pause_after_each_round: args.flexible_bool("pause-after-each-round")?,
        max_changed_lines: args.parsed::<i64>("max-changed-lines")?,
        max_changed_files: args.parsed::<i64>("max-changed-files")?,
    })
}

fn with_extra<'a>(base: &[&'a str], extra: &[&'a str]) -> Vec<&'a str> {
    base.iter().chain(extra).copied().collect()
}

pub fn cmd_run_workflow(args: &[String]) -> Result<String, String> {
    let value_flags = with_extra(SETTINGS_VALUE_FLAGS, &["from", "to"]);
    let args = CommandArgs::parse(args, &value_flags, SETTINGS_SWITCH_FLAGS)?;
    let defaults = RunOptions::default();
    let options = RunOptions::default()
        .with_range(
            args.round("from")?.unwrap_or(defaults.from_round),
            args.round("to")?.unwrap_or(defaults.to_round),
        )
        .with_settings(run_settings(&args)?);

    let result = WorkflowOrchestrator::new(args.project_root()?)
        .run(&options)
        .map_err(map_err)?;
    to_json_output(&result)
}

pub fn cmd_resume_workflow(args: &[String]) -> Result<String, String> {
    let value_flags = with_extra(SETTINGS_VALUE_FLAGS, &["to"]);
    let args = CommandArgs::parse(args, &value_flags, SETTINGS_SWITCH_FLAGS)?;
    let options = ResumeOptions {
        to_round: args.round("to")?.unwrap_or(RoundName::Final),
        settings: run_settings(&args)?,
    };

    let result = WorkflowOrchestrator::new(args.project_root()?)
        .resume(&options)
        .map_err(map_err)?;
    to_json_output(&result)
}
