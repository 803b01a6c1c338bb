/// Decides from captured output whether a failed attempt is worth retrying.
pub trait FailureClassifier {
    fn is_retryable(&self, output: &str) -> bool;
}

pub const DEFAULT_RETRY_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "stream disconnected",
    "error sending request",
    "reconnecting",
    "connection reset",
    "connection refused",
    "temporarily unavailable",
    "stream error",
    "502",
    "503",
    "504",
];

/// Case-insensitive substring match against a marker list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerClassifier {
    markers: Vec<String>,
}

impl MarkerClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|marker| marker.as_ref().to_ascii_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_MARKERS)
    }
}

impl FailureClassifier for MarkerClassifier {
    fn is_retryable(&self, output: &str) -> bool {
        let text = output.to_lowercase();
        self.markers.iter().any(|marker| text.contains(marker.as_str()))
    }
}

pub fn merge_stdio(stdout: &str, stderr: &str) -> String {
    let chunks: Vec<&str> = [stdout, stderr]
        .into_iter()
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.trim_end_matches('\n'))
        .collect();
    chunks.join("\n").trim().to_string()
}

pub fn first_nonempty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// First `error:` line, else first line that is not a `warning:`, else the
/// first non-empty line.
pub fn extract_error_summary(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let starts_with = |line: &str, prefix: &str| line.to_lowercase().starts_with(prefix);
    lines
        .iter()
        .find(|line| starts_with(line, "error:"))
        .or_else(|| lines.iter().find(|line| !starts_with(line, "warning:")))
        .or_else(|| lines.first())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers_match_case_insensitively() {
        let classifier = MarkerClassifier::default();
        assert!(classifier.is_retryable("Network Timeout while streaming"));
        assert!(classifier.is_retryable("upstream returned 503"));
        assert!(!classifier.is_retryable("error: invalid prompt"));
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let classifier = MarkerClassifier::new(["Rate Limited"]);
        assert!(classifier.is_retryable("rate limited, slow down"));
        assert!(!classifier.is_retryable("network down"));
    }

    #[test]
    fn error_summary_prefers_error_lines_then_non_warnings() {
        assert_eq!(
            extract_error_summary("warning: a\nsomething broke\nError: bad flag\n").as_deref(),
            Some("Error: bad flag")
        );
        assert_eq!(
            extract_error_summary("warning: a\n\n  detail line  \n").as_deref(),
            Some("detail line")
        );
        assert_eq!(
            extract_error_summary("warning: only\nWARNING: twice").as_deref(),
            Some("warning: only")
        );
        assert_eq!(extract_error_summary("  \n"), None);
    }

    #[test]
    fn merge_stdio_joins_trimmed_streams() {
        assert_eq!(merge_stdio("out\n\n", "err\n"), "out\nerr");
        assert_eq!(merge_stdio("", "err\n"), "err");
        assert_eq!(merge_stdio("", ""), "");
    }
}
