//! `write_file` — creates or overwrites a file, gated by permission tier.

use super::*;
use anyhow::Result;
use serde_json::{json, Value};
use tokio::fs;

pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description: "Writes content to a file, creating it (and any missing parent \
                directories) or overwriting it if it already exists."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Absolute or working-directory-relative path to write"
                    },
                    "content": {
                        "type": "string",
                        "description": "The full content to write"
                    }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path_arg = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("path is required"))?;

        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("content is required"))?;

        let path = std::path::Path::new(path_arg);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::Path::new(&ctx.cwd).join(path)
        };

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&resolved, content).await?;

        let lines = content.lines().count();

        Ok(ToolResult::success(
            format!("Wrote {} lines to {}", lines, resolved.display()),
            format!("Wrote {} lines to {}", lines, resolved.display()),
        )
        .with_metadata("path", json!(resolved.to_string_lossy()))
        .with_metadata("lines", json!(lines)))
    }
}
