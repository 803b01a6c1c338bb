use crate::changes::DiffSummary;
use crate::config::{threshold_from_config, ProjectConfig};
use crate::rounds::RoundName;

/// Decides whether a round that passed verification stops the workflow for
/// human review. `None` thresholds are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PausePolicy {
    pub pause_after_each_round: bool,
    pub max_changed_files: Option<u64>,
    pub max_changed_lines: Option<u64>,
}

impl PausePolicy {
    /// Project settings with per-invocation overrides applied on top.
    pub fn resolve(
        config: &ProjectConfig,
        pause_after_each_round: Option<bool>,
        max_changed_lines: Option<i64>,
        max_changed_files: Option<i64>,
    ) -> Self {
        Self {
            pause_after_each_round: pause_after_each_round
                .unwrap_or(config.pause_after_each_round),
            max_changed_files: threshold_from_config(
                max_changed_files.unwrap_or(config.max_changed_files),
            ),
            max_changed_lines: threshold_from_config(
                max_changed_lines.unwrap_or(config.max_changed_lines),
            ),
        }
    }

    /// Pause reason for `round`, if any. Thresholds never apply to round0.
    pub fn evaluate(&self, round: RoundName, diff: &DiffSummary) -> Option<String> {
        if round != RoundName::Round0 {
            if let Some(limit) = self.max_changed_files {
                if diff.changed_files as u64 > limit {
                    return Some(format!(
                        "changed_files threshold exceeded: {} > {limit}",
                        diff.changed_files
                    ));
                }
            }
            if let Some(limit) = self.max_changed_lines {
                if diff.changed_lines as u64 > limit {
                    return Some(format!(
                        "changed_lines threshold exceeded: {} > {limit}",
                        diff.changed_lines
                    ));
                }
            }
        }
        if self.pause_after_each_round {
            return Some("pause_after_each_round enabled".to_string());
        }
        None
    }
}
