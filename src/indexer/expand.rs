//! Resolves `@path` tokens in a user prompt to file content, under the
//! same size caps as the rest of the indexer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{is_text_like, FileIndex};

const MAX_CONTENT_SIZE: usize = 256 * 1024;
const MAX_LINE_CHARS: usize = 2_000;
const MAX_TOTAL_LINES: usize = 2_000;

static AT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([^\s]+)").unwrap());

/// A resolved `@path` expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub content: String,
    pub original_size: u64,
    pub truncated: bool,
}

fn truncate_content(raw: &str) -> (String, bool) {
    let mut truncated = false;
    let mut out = String::new();
    let mut line_count = 0;
    let mut byte_count = 0;

    for line in raw.lines() {
        if line_count >= MAX_TOTAL_LINES {
            truncated = true;
            break;
        }

        let line = if line.chars().count() > MAX_LINE_CHARS {
            truncated = true;
            let clipped: String = line.chars().take(MAX_LINE_CHARS).collect();
            format!("{clipped}…")
        } else {
            line.to_string()
        };

        if byte_count + line.len() + 1 > MAX_CONTENT_SIZE {
            truncated = true;
            break;
        }

        byte_count += line.len() + 1;
        out.push_str(&line);
        out.push('\n');
        line_count += 1;
    }

    (out, truncated)
}

/// Expand every `@path` token in `prompt` against `index`. Non-text or
/// unreadable paths are left untouched in the prompt. Returns the enriched
/// prompt (file content blocks prepended, `@path` rewritten to bare `path`)
/// plus the list of references that were actually expanded.
pub async fn expand_at_refs(prompt: &str, index: &FileIndex) -> (String, Vec<FileReference>) {
    let mut references = Vec::new();
    let mut stripped = prompt.to_string();
    let mut preamble = String::new();

    for capture in AT_PATH_RE.captures_iter(prompt) {
        let token = &capture[0];
        let candidate = &capture[1];

        let relative = candidate.trim_end_matches(['.', ',', ':', ';', ')']);
        let full_path = index.root().join(relative);
        if index.find(relative).is_none() {
            if !full_path.is_file() || !is_text_like(&full_path) {
                continue;
            }
        }
        let Ok(metadata) = std::fs::metadata(&full_path) else {
            continue;
        };
        let Ok(raw) = tokio::fs::read_to_string(&full_path).await else {
            continue;
        };

        let (content, truncated) = truncate_content(&raw);
        references.push(FileReference {
            path: relative.to_string(),
            content: content.clone(),
            original_size: metadata.len(),
            truncated,
        });

        preamble.push_str(&format!("[File: {relative}]\n{content}\n\n"));
        stripped = stripped.replacen(token, relative, 1);
    }

    if references.is_empty() {
        return (prompt.to_string(), references);
    }

    let enriched = format!("{preamble}…\n\n{stripped}");
    (enriched, references)
}

/// Tab-completion candidates for the current input `line`: if it ends with
/// an unbroken `@prefix` token (no whitespace after the `@`), return every
/// indexed path starting with `prefix`, each re-prefixed with `@`.
pub fn complete_at_path(line: &str, index: &FileIndex) -> Vec<String> {
    let Some(at_pos) = line.rfind('@') else {
        return Vec::new();
    };
    let prefix = &line[at_pos + 1..];
    if prefix.chars().any(char::is_whitespace) {
        return Vec::new();
    }
    index
        .complete(prefix)
        .into_iter()
        .map(|p| format!("@{p}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expands_known_at_path_and_rewrites_token() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("notes.md"), "hello world").unwrap();

        let index = FileIndex::build(root.path().to_path_buf()).await;
        let (enriched, refs) = expand_at_refs("summarize @notes.md please", &index).await;

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, "notes.md");
        assert!(enriched.contains("[File: notes.md]"));
        assert!(enriched.contains("summarize notes.md please"));
    }

    #[tokio::test]
    async fn leaves_prompt_untouched_when_no_at_path_resolves() {
        let root = tempfile::tempdir().unwrap();
        let index = FileIndex::build(root.path().to_path_buf()).await;
        let (enriched, refs) = expand_at_refs("no file refs here", &index).await;

        assert!(refs.is_empty());
        assert_eq!(enriched, "no file refs here");
    }

    #[test]
    fn truncate_content_caps_total_lines() {
        let raw = "line\n".repeat(MAX_TOTAL_LINES + 10);
        let (content, truncated) = truncate_content(&raw);
        assert!(truncated);
        assert_eq!(content.lines().count(), MAX_TOTAL_LINES);
    }

    #[test]
    fn truncate_content_clips_long_lines() {
        let raw = "a".repeat(MAX_LINE_CHARS + 50);
        let (content, truncated) = truncate_content(&raw);
        assert!(truncated);
        assert!(content.trim_end().ends_with('…'));
    }

    #[tokio::test]
    async fn completes_at_prefix_from_trailing_token() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("readme.md"), "x").unwrap();
        std::fs::write(root.path().join("report.txt"), "x").unwrap();

        let index = FileIndex::build(root.path().to_path_buf()).await;
        let mut candidates = complete_at_path("look at @re", &index);
        candidates.sort();
        assert_eq!(candidates, vec!["@readme.md", "@report.txt"]);
    }

    #[tokio::test]
    async fn no_completions_once_whitespace_follows_at() {
        let root = tempfile::tempdir().unwrap();
        let index = FileIndex::build(root.path().to_path_buf()).await;
        assert!(complete_at_path("look at @foo bar", &index).is_empty());
    }

    #[tokio::test]
    async fn no_at_token_yields_no_completions() {
        let root = tempfile::tempdir().unwrap();
        let index = FileIndex::build(root.path().to_path_buf()).await;
        assert!(complete_at_path("no token here", &index).is_empty());
    }
}
