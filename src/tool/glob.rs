//! `glob_find` — recursively walks the root and matches relative entries
//! against a glob pattern translated by hand into a regex (`**`, `*`, `?`),
//! sorted by modification time, newest first.

use super::*;
use anyhow::Result;
use regex::Regex;
use serde_json::{json, Value};
use std::time::SystemTime;
use walkdir::WalkDir;

const MAX_RESULTS: usize = 200;

pub struct GlobFindTool;

impl GlobFindTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GlobFindTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for GlobFindTool {
    fn name(&self) -> &str {
        "glob_find"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "glob_find".to_string(),
            description: "Finds files whose path (relative to the search root) matches a \
                glob pattern (`**`, `*`, `?` supported), sorted by modification time, \
                newest first, capped at 200 results."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern, e.g. \"src/**/*.rs\""
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (defaults to the working directory)"
                    }
                },
                "required": ["pattern"]
            }),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("pattern is required"))?;

        let search_path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.cwd)
            .to_string();

        let regex = glob_to_regex(pattern);
        let root = std::path::PathBuf::from(&search_path);

        let mut matches: Vec<(String, SystemTime)> = Vec::new();
        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            if regex.is_match(&relative) {
                let mtime = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                matches.push((relative, mtime));
            }
        }

        matches.sort_by(|a, b| b.1.cmp(&a.1));

        let total = matches.len();
        let truncated = total > MAX_RESULTS;
        matches.truncate(MAX_RESULTS);

        let output = if matches.is_empty() {
            format!("No files matching '{pattern}' in {search_path}")
        } else {
            matches
                .iter()
                .map(|(p, _)| p.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };

        let title = if total == 0 {
            format!("No files matching '{pattern}'")
        } else {
            format!("Found {total} file(s) matching '{pattern}'")
        };

        Ok(ToolResult::success(title, output)
            .with_metadata("pattern", json!(pattern))
            .with_metadata("count", json!(total))
            .with_truncated(truncated))
    }
}

/// Translate a glob pattern into an anchored regex. `**` matches any number
/// of path segments including none, `*` matches within a single segment,
/// `?` matches one character.
fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // consume an optional following slash so `**/` matches zero dirs
                    if chars.peek() == Some(&'/') {
                        chars.next();
                    }
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }

    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").expect("empty-match fallback"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_matches_nested_paths() {
        let re = glob_to_regex("src/**/*.rs");
        assert!(re.is_match("src/tool/mod.rs"));
        assert!(re.is_match("src/main.rs"));
        assert!(!re.is_match("tests/main.rs"));
    }

    #[test]
    fn single_star_stays_within_one_segment() {
        let re = glob_to_regex("*.toml");
        assert!(re.is_match("Cargo.toml"));
        assert!(!re.is_match("sub/Cargo.toml"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        let re = glob_to_regex("a?c.txt");
        assert!(re.is_match("abc.txt"));
        assert!(!re.is_match("ac.txt"));
    }
}
