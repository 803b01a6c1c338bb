use crate::execution::{CodexRunRequest, ASK_FOR_APPROVAL_MODE, SANDBOX_MODE};
use crate::shared::process::CommandSpec;
use std::path::Path;

pub const CODEX_BIN_ENV: &str = "NOTES_AGENT_CODEX_BIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBinaries {
    pub codex: String,
}

impl Default for ToolBinaries {
    fn default() -> Self {
        Self {
            codex: "codex".to_string(),
        }
    }
}

impl ToolBinaries {
    /// Defaults, with the codex executable overridden by `NOTES_AGENT_CODEX_BIN`
    /// when set and non-empty.
    pub fn from_env() -> Self {
        let mut binaries = Self::default();
        if let Ok(value) = std::env::var(CODEX_BIN_ENV) {
            if !value.trim().is_empty() {
                binaries.codex = value;
            }
        }
        binaries
    }

    pub fn version_probe(&self) -> CommandSpec {
        CommandSpec::new(&self.codex).arg("--version")
    }
}

/// Non-interactive `exec` confined to the project root, with the notes root
/// as an extra writable directory and the prompt as the trailing argument.
pub fn build_codex_invocation(
    request: &CodexRunRequest,
    project_root: &Path,
    notes_root: &Path,
    last_message_path: &Path,
    binaries: &ToolBinaries,
) -> CommandSpec {
    let mut spec = CommandSpec::new(&binaries.codex)
        .arg("--ask-for-approval")
        .arg(ASK_FOR_APPROVAL_MODE)
        .arg("exec")
        .arg("--cd")
        .arg(project_root.display().to_string())
        .arg("--sandbox")
        .arg(SANDBOX_MODE)
        .arg("--add-dir")
        .arg(notes_root.display().to_string())
        .arg("--skip-git-repo-check")
        .arg("--output-last-message")
        .arg(last_message_path.display().to_string());
    if let Some(model) = &request.model {
        spec = spec.arg("--model").arg(model);
    }
    if request.search_enabled {
        spec = spec.arg("--search");
    }
    spec.arg(&request.prompt).current_dir(project_root)
}
