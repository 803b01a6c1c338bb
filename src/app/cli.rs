#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    CreateProject,
    ShowProject,
    ListProjects,
    SnapshotSources,
    VerifySnapshot,
    RunCodex,
    InitRound0,
    RunCheck,
    RunWorkflow,
    ResumeWorkflow,
    ListRuns,
    ShowPatch,
    RoundStatus,
    AddFeedback,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "create-project" => CliVerb::CreateProject,
        "show-project" => CliVerb::ShowProject,
        "list-projects" => CliVerb::ListProjects,
        "snapshot-sources" => CliVerb::SnapshotSources,
        "verify-snapshot" => CliVerb::VerifySnapshot,
        "run-codex" => CliVerb::RunCodex,
        "init-round0" => CliVerb::InitRound0,
        "run-check" => CliVerb::RunCheck,
        "run-workflow" => CliVerb::RunWorkflow,
        "resume-workflow" => CliVerb::ResumeWorkflow,
        "list-runs" => CliVerb::ListRuns,
        "show-patch" => CliVerb::ShowPatch,
        "round-status" => CliVerb::RoundStatus,
        "add-feedback" => CliVerb::AddFeedback,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  create-project --course-id <id> [--workspace-root <dir>]  Create a course project"
            .to_string(),
        "  show-project --project-root <dir>        Print project.yaml as JSON".to_string(),
        "  list-projects --workspace-root <dir>     List projects under a workspace".to_string(),
        "  snapshot-sources --project-root <dir> --source <path>...  Freeze course sources"
            .to_string(),
        "  verify-snapshot --project-root <dir>     Re-hash the frozen sources".to_string(),
        "  run-codex --project-root <dir> --prompt <text>  Run the generator once".to_string(),
        "  init-round0 --project-root <dir> [--force]  Write the notes scaffold".to_string(),
        "  run-check --project-root <dir>           Run scripts/check.sh".to_string(),
        "  run-workflow --project-root <dir> [--from <round>] [--to <round>]  Run rounds"
            .to_string(),
        "  resume-workflow --project-root <dir> [--to <round>]  Continue from saved state"
            .to_string(),
        "  list-runs --project-root <dir>           List run directories, newest first"
            .to_string(),
        "  show-patch --project-root <dir> --run-id <id> [--round <round>]  Print a round diff"
            .to_string(),
        "  round-status --project-root <dir>        Print per-round status".to_string(),
        "  add-feedback --project-root <dir> --item <text>...  Append review feedback"
            .to_string(),
        "  help                                     Show this message".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
