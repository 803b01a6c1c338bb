use crate::config::{ReviewGranularity, CHECK_SCRIPT_REL_PATH, FEEDBACK_REL_PATH};

pub const MANIFEST_REL_PATH: &str = "index/manifest.yml";
pub const QUESTIONS_BACKLOG_REL_PATH: &str = "index/questions_backlog.md";
pub const GLOSSARY_REL_PATH: &str = "index/glossary.md";
pub const LECTURES_README_REL_PATH: &str = "notes/lectures/README.md";
pub const CHEATSHEET_REL_PATH: &str = "notes/cheatsheet.md";
pub const FLASHCARDS_REL_PATH: &str = "notes/flashcards.csv";
pub const RUBRIC_REL_PATH: &str = "review/rubric.md";

pub const QUESTIONS_BACKLOG_TEMPLATE: &str = include_str!("assets/questions_backlog.md");
pub const GLOSSARY_TEMPLATE: &str = include_str!("assets/glossary.md");
pub const LECTURES_README_TEMPLATE: &str = include_str!("assets/lectures_readme.md");
pub const CHEATSHEET_TEMPLATE: &str = include_str!("assets/cheatsheet.md");
pub const FLASHCARDS_TEMPLATE: &str = include_str!("assets/flashcards.csv");
pub const FEEDBACK_TEMPLATE: &str = include_str!("assets/feedback.md");
pub const RUBRIC_TEMPLATE: &str = include_str!("assets/rubric.md");
pub const CHECK_SCRIPT_TEMPLATE: &str = include_str!("assets/check.sh");

/// Values substituted into `index/manifest.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFields<'a> {
    pub course_id: &'a str,
    pub language: &'a str,
    pub review_granularity: ReviewGranularity,
    pub human_review_timing: &'a str,
    pub generated_at: &'a str,
}

pub fn render_manifest(fields: &ManifestFields<'_>) -> String {
    format!(
        "version: 1\ncourse_id: {}\nlanguage: {}\nreview_granularity: {}\nhuman_review_timing: {}\ngenerated_at: {}\n",
        fields.course_id,
        fields.language,
        fields.review_granularity.as_str(),
        fields.human_review_timing,
        fields.generated_at
    )
}

/// Every scaffold file as `(notes-relative path, content)`, in write order.
pub fn scaffold_files(manifest: String, enable_flashcards: bool) -> Vec<(&'static str, String)> {
    let mut files = vec![
        (MANIFEST_REL_PATH, manifest),
        (
            QUESTIONS_BACKLOG_REL_PATH,
            QUESTIONS_BACKLOG_TEMPLATE.to_string(),
        ),
        (GLOSSARY_REL_PATH, GLOSSARY_TEMPLATE.to_string()),
        (LECTURES_README_REL_PATH, LECTURES_README_TEMPLATE.to_string()),
        (CHEATSHEET_REL_PATH, CHEATSHEET_TEMPLATE.to_string()),
    ];
    if enable_flashcards {
        files.push((FLASHCARDS_REL_PATH, FLASHCARDS_TEMPLATE.to_string()));
    }
    files.push((FEEDBACK_REL_PATH, FEEDBACK_TEMPLATE.to_string()));
    files.push((RUBRIC_REL_PATH, RUBRIC_TEMPLATE.to_string()));
    files.push((CHECK_SCRIPT_REL_PATH, CHECK_SCRIPT_TEMPLATE.to_string()));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_course_settings() {
        let rendered = render_manifest(&ManifestFields {
            course_id: "algo",
            language: "zh-CN",
            review_granularity: ReviewGranularity::Section,
            human_review_timing: "final_only",
            generated_at: "2026-01-01T00:00:00Z",
        });
        assert!(rendered.starts_with("version: 1\ncourse_id: algo\n"));
        assert!(rendered.contains("review_granularity: section\n"));
    }

    #[test]
    fn flashcards_are_optional_and_check_script_is_last() {
        let without = scaffold_files(String::new(), false);
        assert!(without.iter().all(|(rel, _)| *rel != FLASHCARDS_REL_PATH));
        let with = scaffold_files(String::new(), true);
        assert_eq!(with.len(), without.len() + 1);
        assert_eq!(with.last().map(|(rel, _)| *rel), Some(CHECK_SCRIPT_REL_PATH));
        assert!(CHECK_SCRIPT_TEMPLATE.contains("\"passed\""));
    }
}
