//! `edit_file` — exact string replacement with a context diff in the result.

use super::*;
use anyhow::Result;
use serde_json::{json, Value};
use similar::{ChangeTag, TextDiff};
use tokio::fs;

pub struct EditTool;

impl EditTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "edit_file".to_string(),
            description: r#"Performs an exact string replacement in a file.
- old_string must match exactly (including whitespace and indentation)
- Fails if old_string is not found
- Fails if old_string appears more than once, unless replace_all is true"#
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to the file to modify"
                    },
                    "old_string": {
                        "type": "string",
                        "description": "The exact text to replace"
                    },
                    "new_string": {
                        "type": "string",
                        "description": "The replacement text"
                    },
                    "replace_all": {
                        "type": "boolean",
                        "description": "Replace every occurrence instead of requiring a unique match"
                    }
                },
                "required": ["path", "old_string", "new_string"]
            }),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path_arg = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("path is required"))?;

        let old_string = args
            .get("old_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("old_string is required"))?;

        let new_string = args
            .get("new_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("new_string is required"))?;

        let replace_all = args
            .get("replace_all")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let path = std::path::Path::new(path_arg);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::Path::new(&ctx.cwd).join(path)
        };

        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", resolved.display()))?;

        let occurrences = content.matches(old_string).count();

        if occurrences == 0 {
            anyhow::bail!(
                "old_string not found in {}.\n\nSearched for:\n{}",
                resolved.display(),
                old_string
            );
        }

        if occurrences > 1 && !replace_all {
            anyhow::bail!(
                "old_string matched {} times in {}; narrow the match or pass replace_all: true",
                occurrences,
                resolved.display()
            );
        }

        let new_content = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        fs::write(&resolved, &new_content).await?;

        let old_lines = content.lines().count();
        let new_lines = new_content.lines().count();
        let line_diff = new_lines as i64 - old_lines as i64;
        let replacements = if replace_all { occurrences } else { 1 };

        let diff = context_diff(&content, &new_content, 3);

        let summary = format!(
            "Edited {}\nReplacements: {}\nLines: {} -> {} ({:+})\n\n{}",
            resolved.display(),
            replacements,
            old_lines,
            new_lines,
            line_diff,
            diff
        );

        Ok(ToolResult::success(
            format!("Edited {} ({replacements} replacement(s))", resolved.display()),
            summary,
        )
        .with_metadata("path", json!(resolved.to_string_lossy()))
        .with_metadata("replacements", json!(replacements))
        .with_metadata("lineDiff", json!(line_diff)))
    }
}

/// Render a unified-style diff with `context` lines of padding around the
/// first changed hunk.
fn context_diff(old: &str, new: &str, context: usize) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();

    for group in diff.grouped_ops(context) {
        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                out.push_str(sign);
                out.push_str(change.value());
                if !change.value().ends_with('\n') {
                    out.push('\n');
                }
            }
        }
        break;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_diff_shows_added_and_removed_lines() {
        let old = "line1\nline2\nline3\nline4\nline5\n";
        let new = "line1\nline2\nCHANGED\nline4\nline5\n";
        let diff = context_diff(old, new, 3);
        assert!(diff.contains("-line3"));
        assert!(diff.contains("+CHANGED"));
    }
}
