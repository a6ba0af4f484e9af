//! Tool system: the fixed set of functions the model may call.
//!
//! Each tool is a small, stateless executor. Permission gating happens one
//! layer up, in the agent loop via [`crate::permission::PermissionManager`] —
//! a tool itself never prompts or negotiates scope.

mod bash;
mod edit;
mod glob;
mod grep;
mod read;
mod write;

pub use bash::ExecShellTool;
pub use edit::EditTool;
pub use glob::GlobFindTool;
pub use grep::GrepSearchTool;
pub use read::ReadFileTool;
pub use write::WriteFileTool;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

pub use crate::message::ToolDefinition;

/// Working-directory context passed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub cwd: String,
    pub root: String,
}

impl ToolContext {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            cwd: root.clone(),
            root,
        }
    }
}

/// Result of a tool execution: a human-facing title and the full output
/// text fed back to the model as the tool-result message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub title: String,
    pub output: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub truncated: bool,
}

impl ToolResult {
    pub fn success(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata: HashMap::new(),
            truncated: false,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

pub const MAX_OUTPUT_SIZE: usize = 50 * 1024;
pub const MAX_OUTPUT_LINES: usize = 2000;

/// Truncate `output` to [`MAX_OUTPUT_LINES`] lines, then to
/// [`MAX_OUTPUT_SIZE`] bytes, appending a note when either limit is hit.
pub fn truncate_output(output: &str) -> (String, bool) {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() > MAX_OUTPUT_LINES {
        let truncated: String = lines[..MAX_OUTPUT_LINES].join("\n");
        let msg = format!(
            "\n\n[Output truncated: {} lines shown of {} total]",
            MAX_OUTPUT_LINES,
            lines.len()
        );
        return (truncated + &msg, true);
    }

    if output.len() > MAX_OUTPUT_SIZE {
        let mut truncated = String::new();
        let mut current_size = 0;

        for line in lines {
            if current_size + line.len() + 1 > MAX_OUTPUT_SIZE {
                break;
            }
            if !truncated.is_empty() {
                truncated.push('\n');
                current_size += 1;
            }
            truncated.push_str(line);
            current_size += line.len();
        }

        let msg = format!(
            "\n\n[Output truncated: {} bytes shown of {} total]",
            current_size,
            output.len()
        );
        return (truncated + &msg, true);
    }

    (output.to_string(), false)
}

/// Resolve `path` against `root` and reject it if canonicalization escapes
/// the root (symlink or `..` traversal).
pub fn validate_path(path: &str, root: &str) -> Result<std::path::PathBuf> {
    let path = Path::new(path);
    let root = Path::new(root);

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let canonical = absolute.canonicalize().unwrap_or(absolute);
    let root_canonical = root.canonicalize().unwrap_or(root.to_path_buf());

    if !canonical.starts_with(&root_canonical) {
        anyhow::bail!(
            "path '{}' is outside project root '{}'",
            canonical.display(),
            root_canonical.display()
        );
    }

    Ok(canonical)
}
