//! Structured error types for the library surface.
//!
//! The binary/CLI layer works in `anyhow::Result` for ergonomic `?`
//! composition; library code returns `CaretForgeError` so callers can match
//! on the failure kind (provider vs. config vs. tool-adjacent I/O) instead
//! of inspecting a string.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaretForgeError {
    /// Failure reaching a remote model or parsing its response. Terminates
    /// the current turn; the REPL continues to the next user turn.
    #[error("provider error ({status:?}): {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    /// Missing, malformed, or semantically invalid configuration. Fatal.
    #[error("config error: {0}")]
    Config(String),

    /// Failure inside a tool executor. Converted to a tool-result message
    /// and fed back to the model; never propagated past the agent loop.
    #[error("tool error: {0}")]
    Tool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaretForgeError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool(message.into())
    }

    /// Short machine-readable code, used in user-facing error printouts.
    pub fn code(&self) -> &'static str {
        match self {
            CaretForgeError::Provider { .. } => "provider_error",
            CaretForgeError::Config(_) => "config_error",
            CaretForgeError::Tool(_) => "tool_error",
            CaretForgeError::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CaretForgeError>;
