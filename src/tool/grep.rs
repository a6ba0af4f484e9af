//! `grep_search` — spawns `rg`, falling back to system `grep` if `rg` is
//! not on PATH or fails to launch.

use super::*;
use anyhow::Result;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;

/// Translate an `include` glob (e.g. `*.rs`) into a ripgrep `-g` filter and
/// a best-effort suffix check for the system-`grep` fallback, which has no
/// native glob filtering.
fn include_suffix(include: &str) -> Option<&str> {
    include.strip_prefix("*.")
}

const MAX_OUTPUT_LINES_SHOWN: usize = 200;

pub struct GrepSearchTool;

impl GrepSearchTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GrepSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "grep_search".to_string(),
            description: "Searches file contents for a regex pattern, line-numbered, \
                capped at 200 lines of output. Uses ripgrep if available, falling back \
                to grep."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regex pattern to search for"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (defaults to the working directory)"
                    },
                    "include": {
                        "type": "string",
                        "description": "Glob filter for filenames to search, e.g. \"*.rs\""
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

        if pattern.is_empty() {
            anyhow::bail!("pattern must not be empty");
        }

        let search_path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.cwd);

        let include = args.get("include").and_then(|v| v.as_str());

        let output = match run_ripgrep(pattern, search_path, include).await {
            Ok(out) => out,
            Err(_) => run_grep(pattern, search_path, include).await?,
        };

        let lines: Vec<&str> = output.lines().collect();
        let total = lines.len();
        let truncated = total > MAX_OUTPUT_LINES_SHOWN;
        let shown = if truncated {
            let mut s = lines[..MAX_OUTPUT_LINES_SHOWN].join("\n");
            s.push_str(&format!(
                "\n\n[Output truncated: {MAX_OUTPUT_LINES_SHOWN} lines shown of {total} total]"
            ));
            s
        } else {
            lines.join("\n")
        };

        let title = if total == 0 {
            format!("No matches for '{pattern}'")
        } else {
            format!("Found {total} matching line(s) for '{pattern}'")
        };

        Ok(ToolResult::success(title, shown)
            .with_metadata("pattern", json!(pattern))
            .with_metadata("count", json!(total))
            .with_truncated(truncated))
    }
}

async fn run_ripgrep(pattern: &str, path: &str, include: Option<&str>) -> Result<String> {
    let mut cmd = Command::new("rg");
    cmd.args(["-n", "--max-count", "500"]);
    if let Some(glob) = include {
        cmd.args(["-g", glob]);
    }
    cmd.arg(pattern).arg(path);

    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `grep` has no native glob filter, so when `include` is set, filter the
/// result lines by filename suffix after the fact (a `*.ext` glob is the
/// only form ripgrep's `-g` gets used for here too).
async fn run_grep(pattern: &str, path: &str, include: Option<&str>) -> Result<String> {
    let output = Command::new("grep")
        .args(["-rn", pattern, path])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await?;

    let text = String::from_utf8_lossy(&output.stdout).into_owned();

    match include.and_then(include_suffix) {
        Some(suffix) => Ok(text
            .lines()
            .filter(|line| {
                line.split_once(':')
                    .map(|(file, _)| file.ends_with(suffix))
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>()
            .join("\n")),
        None => Ok(text),
    }
}
