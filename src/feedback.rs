use crate::config::feedback_file_path;
use crate::shared::clock::now_rfc3339;
use crate::shared::fs_atomic::absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FEEDBACK_HEADER: &str = "# Final Review Feedback\n\n";

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback items cannot be empty")]
    NoItems,
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> FeedbackError {
    FeedbackError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAppendResult {
    pub feedback_path: PathBuf,
    pub appended_items: Vec<String>,
    pub section_title: String,
    pub author: Option<String>,
    pub appended_at: String,
}

/// Appends a `## <title>` checklist section to `review/feedback.md`, which
/// round3 works through. Blank items are dropped.
pub fn append_feedback(
    notes_root: &Path,
    items: &[String],
    section_title: Option<&str>,
    author: Option<&str>,
) -> Result<FeedbackAppendResult, FeedbackError> {
    let appended_items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if appended_items.is_empty() {
        return Err(FeedbackError::NoItems);
    }

    let notes = absolutize(notes_root).map_err(|e| io_error(notes_root, e))?;
    let path = feedback_file_path(&notes);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    if !path.exists() {
        fs::write(&path, FEEDBACK_HEADER).map_err(|e| io_error(&path, e))?;
    }

    let now = now_rfc3339();
    let title = section_title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Feedback {now}"));
    let author = author
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(str::to_string);

    let mut block = format!("\n## {title}\n");
    if let Some(author) = &author {
        block.push_str(&format!("- Author: {author}\n"));
    }
    for item in &appended_items {
        block.push_str(&format!("- [ ] {item}\n"));
    }
    block.push_str(&format!("- AddedAt: {now}\n"));

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .map_err(|e| io_error(&path, e))?;
    file.write_all(block.as_bytes())
        .map_err(|e| io_error(&path, e))?;

    Ok(FeedbackAppendResult {
        feedback_path: path,
        appended_items,
        section_title: title,
        author,
        appended_at: now,
    })
}
