//! `exec_shell` — runs a command through `bash -c`, gated by the safety
//! classifier and permission manager one layer up.

use super::*;
use anyhow::Result;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub struct ExecShellTool;

impl ExecShellTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExecShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ExecShellTool {
    fn name(&self) -> &str {
        "exec_shell"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "exec_shell".to_string(),
            description: "Runs a command through bash -c and returns its stdout, stderr, \
                and exit code. Times out after 30 seconds by default."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to run"
                    },
                    "cwd": {
                        "type": "string",
                        "description": "Working directory for the command"
                    },
                    "timeoutMs": {
                        "type": "number",
                        "description": "Timeout in milliseconds (default 30000)"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("command is required"))?;

        let cwd = args
            .get("cwd")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| ctx.cwd.clone());

        let timeout_ms = args
            .get("timeoutMs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let mut child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

        let collect = async {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            let (stdout_res, stderr_res, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout_buf),
                stderr_pipe.read_to_end(&mut stderr_buf),
                child.wait()
            );
            stdout_res?;
            stderr_res?;
            let status = status?;
            Ok::<_, std::io::Error>((stdout_buf, stderr_buf, status))
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), collect).await {
            Ok(Ok((stdout_buf, stderr_buf, status))) => {
                let stdout = String::from_utf8_lossy(&stdout_buf).trim_end().to_string();
                let stderr = String::from_utf8_lossy(&stderr_buf).trim_end().to_string();
                let exit_code = status.code().unwrap_or(-1);

                let body = json!({
                    "stdout": stdout,
                    "stderr": stderr,
                    "exitCode": exit_code,
                });

                let title = if status.success() {
                    "Command completed".to_string()
                } else {
                    format!("Command exited with code {exit_code}")
                };

                Ok(ToolResult::success(title, body.to_string())
                    .with_metadata("exitCode", json!(exit_code)))
            }
            Ok(Err(e)) => anyhow::bail!("failed to execute command: {e}"),
            Err(_) => {
                let _ = child.kill().await;
                anyhow::bail!("command timed out after {timeout_ms}ms")
            }
        }
    }
}
