//! Subcommand implementations. `main.rs` owns the `clap` argument grammar
//! and only dispatches here; one file per command family, a thin
//! `pub async fn execute(...)` or similarly named entry point per command.

pub mod config_cmd;
pub mod doctor;
pub mod model;
pub mod output;
pub mod repl;
pub mod run;

use crate::permission::PermissionManager;
use crate::tool::{EditTool, ExecShellTool, GlobFindTool, GrepSearchTool, ReadFileTool, Tool, WriteFileTool};

/// Global flags shared by every subcommand that talks to a model.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub stream: bool,
    pub json: bool,
    pub allow_shell: bool,
    pub allow_write: bool,
}

/// The fixed tool set the agent loop is given.
pub fn build_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(ReadFileTool),
        Box::new(WriteFileTool),
        Box::new(EditTool),
        Box::new(ExecShellTool),
        Box::new(GrepSearchTool),
        Box::new(GlobFindTool),
    ]
}

pub fn build_permissions(opts: &RunOptions) -> PermissionManager {
    PermissionManager::new(opts.allow_write, opts.allow_shell)
}
