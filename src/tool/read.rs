//! `read_file` — unconditionally allowed, whole-file UTF-8 read.

use super::*;
use anyhow::Result;
use serde_json::{json, Value};
use tokio::fs;

pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Reads the full contents of a file at the given path as UTF-8 text."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Absolute or working-directory-relative path to read"
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path_arg = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("path is required"))?;

        let path = std::path::Path::new(path_arg);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::Path::new(&ctx.cwd).join(path)
        };

        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", resolved.display()))?;

        let lines = content.lines().count();
        let (output, truncated) = truncate_output(&content);

        Ok(ToolResult::success(
            format!("Read {} ({} lines)", resolved.display(), lines),
            output,
        )
        .with_metadata("path", json!(resolved.to_string_lossy()))
        .with_metadata("lines", json!(lines))
        .with_truncated(truncated))
    }
}
