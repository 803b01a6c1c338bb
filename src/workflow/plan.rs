use crate::config::FEEDBACK_REL_PATH;
use crate::rounds::RoundName;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// Template initialization followed by verification, no generation.
    Scaffold,
    /// Prompted generation, verification and at most one repair.
    Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    pub round: RoundName,
    pub kind: RoundKind,
    pub task: &'static str,
}

pub fn round_plan(round: RoundName) -> RoundPlan {
    let (kind, task) = match round {
        RoundName::Round0 => (
            RoundKind::Scaffold,
            "Initialize the notes scaffold and verification script.",
        ),
        RoundName::Round1 => (
            RoundKind::Generation,
            "Draft a skeleton note for each lecture in scope.",
        ),
        RoundName::Round2 => (
            RoundKind::Generation,
            "Expand the drafts with readable explanations, worked examples, exercises and common pitfalls.",
        ),
        RoundName::Round3 => (
            RoundKind::Generation,
            "Read review/feedback.md, address only the unchecked items and record a resolution under each.",
        ),
        RoundName::Final => (
            RoundKind::Generation,
            "Update the cheatsheet, clean up the glossary and make the notes consistent end to end.",
        ),
    };
    RoundPlan { round, kind, task }
}

/// Inputs shared by every prompt of one workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext<'a> {
    pub notes_root: &'a Path,
    pub language: &'a str,
    pub target_lectures: &'a [String],
    pub allow_external_refs: bool,
}

fn external_reference_rule(round: RoundName, allow_external_refs: bool) -> &'static str {
    if allow_external_refs && round == RoundName::Final {
        "External further reading is allowed in this round, but only in a separate section with a source link for every item."
    } else {
        "Do not rely on external material; work only from the local sources and the existing notes."
    }
}

pub fn build_round_prompt(round: RoundName, context: &PromptContext<'_>) -> String {
    let plan = round_plan(round);
    let scope = if context.target_lectures.is_empty() {
        "all lectures".to_string()
    } else {
        context.target_lectures.join(", ")
    };
    let feedback_hint = if round == RoundName::Round3 {
        format!("Feedback file: {FEEDBACK_REL_PATH}\n")
    } else {
        String::new()
    };
    format!(
        "You are a course notes generation assistant.\n\
         Round: {round}\n\
         Scope: {scope}\n\
         Task: {task}\n\
         notes_root: {notes_root}\n\
         {feedback_hint}\
         {external_rule}\n\
         Global requirements:\n\
         1. Write explanations in {language}; code blocks and technical terms may stay in English.\n\
         2. Add a `Source:` tag to every non-trivial claim.\n\
         3. Make only the changes this round needs; do not rewrite broadly.\n\
         4. Stop when the task is done.\n",
        task = plan.task,
        notes_root = context.notes_root.display(),
        external_rule = external_reference_rule(round, context.allow_external_refs),
        language = context.language,
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- none".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the single repair attempt after a failed verification.
pub fn build_repair_prompt(
    round: RoundName,
    context: &PromptContext<'_>,
    errors: &[String],
    warnings: &[String],
) -> String {
    format!(
        "You are a course notes repair assistant. Fix only the problems the checker reported.\n\
         Round: {round}\n\
         notes_root: {notes_root}\n\
         Check errors:\n\
         {errors}\n\
         Check warnings:\n\
         {warnings}\n\
         Requirements:\n\
         1. Modify only files directly related to the errors.\n\
         2. Keep explanations in {language} and keep the `Source:` tagging convention.\n\
         3. Do not add unrelated content.\n\
         4. Stop when the task is done.\n",
        notes_root = context.notes_root.display(),
        errors = bullet_list(errors),
        warnings = bullet_list(warnings),
        language = context.language,
    )
}
