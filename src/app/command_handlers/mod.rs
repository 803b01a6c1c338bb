use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod history;
pub mod projects;
pub mod round_steps;
pub mod sources;
pub mod workflows;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    let rest = &args[1..];
    match parse_cli_verb(args[0].as_str()) {
        CliVerb::CreateProject => projects::cmd_create_project(rest),
        CliVerb::ShowProject => projects::cmd_show_project(rest),
        CliVerb::ListProjects => projects::cmd_list_projects(rest),
        CliVerb::SnapshotSources => sources::cmd_snapshot_sources(rest),
        CliVerb::VerifySnapshot => sources::cmd_verify_snapshot(rest),
        CliVerb::RunCodex => round_steps::cmd_run_codex(rest),
        CliVerb::InitRound0 => round_steps::cmd_init_round0(rest),
        CliVerb::RunCheck => round_steps::cmd_run_check(rest),
        CliVerb::RunWorkflow => workflows::cmd_run_workflow(rest),
        CliVerb::ResumeWorkflow => workflows::cmd_resume_workflow(rest),
        CliVerb::ListRuns => history::cmd_list_runs(rest),
        CliVerb::ShowPatch => history::cmd_show_patch(rest),
        CliVerb::RoundStatus => history::cmd_round_status(rest),
        CliVerb::AddFeedback => history::cmd_add_feedback(rest),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
