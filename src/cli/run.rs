//! One-shot task execution — the `run [task…]` subcommand and the implicit
//! form (`caretforge <task words>` with no recognized subcommand). Always
//! proceeds regardless of whether stdin is a terminal; see
//! `crate::disclaimer` for the one place TTY state still matters.

use std::io::Write as _;

use anyhow::{Context, Result};

use crate::agent::{AgentLoop, AgentObserver, SilentObserver};
use crate::cli::output::{print_json_error, print_json_turn, JsonTurn};
use crate::cli::{build_permissions, build_tools, RunOptions};
use crate::config::Config;
use crate::indexer::expand::expand_at_refs;
use crate::indexer::FileIndex;
use crate::provider::registry;
use crate::system_prompt::SYSTEM_PROMPT;
use crate::tool::ToolContext;

/// Streams tokens to stdout as they arrive; tool call/result lines go to
/// stderr so they never corrupt the token stream.
struct StdoutObserver;

impl AgentObserver for StdoutObserver {
    fn on_token(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    fn on_tool_call(&self, call: &crate::message::ToolCall) {
        eprintln!("\n[tool call: {}]", call.name);
    }

    fn on_tool_result(&self, call: &crate::message::ToolCall, _result: &str) {
        eprintln!("[tool result: {}]", call.name);
    }
}

pub async fn execute(task_words: Vec<String>, opts: RunOptions) -> Result<()> {
    let task = if task_words.is_empty() {
        read_stdin_task()?
    } else {
        task_words.join(" ")
    };

    let config = Config::load().await.context("failed to load config")?;

    let resolved = match registry::resolve(&config, opts.provider.as_deref(), opts.model.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            if opts.json {
                print_json_error(e.to_string());
                std::process::exit(1);
            }
            return Err(anyhow::anyhow!(e));
        }
    };

    let cwd = std::env::current_dir()?.to_string_lossy().to_string();
    let index = FileIndex::build(cwd.clone()).await;
    let (enriched_task, _refs) = expand_at_refs(&task, &index).await;

    let ctx = ToolContext::new(cwd);
    let mut permissions = build_permissions(&opts);
    let tools = build_tools();
    let mut agent = AgentLoop::new(resolved.provider.as_ref(), tools, &mut permissions);

    let observer: Box<dyn AgentObserver> = if opts.json {
        Box::new(SilentObserver)
    } else {
        Box::new(StdoutObserver)
    };

    let result = agent
        .run(
            SYSTEM_PROMPT,
            vec![crate::message::Message::user(enriched_task)],
            &resolved.model,
            opts.stream,
            &ctx,
            observer.as_ref(),
        )
        .await;

    match result {
        Ok(result) => {
            if opts.json {
                let turn = JsonTurn::from_result(&task, &resolved.provider_name, &resolved.model, &result);
                print_json_turn(&turn);
            } else {
                println!();
            }
            Ok(())
        }
        Err(e) => {
            if opts.json {
                print_json_error(e.to_string());
                std::process::exit(1);
            }
            Err(anyhow::anyhow!(e))
        }
    }
}

/// No task words given on the command line: read the whole of stdin as the
/// task text, the way a Unix filter reads its input.
fn read_stdin_task() -> Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("no task given and stdin could not be read")?;
    let buf = buf.trim().to_string();
    if buf.is_empty() {
        anyhow::bail!("no task given: pass task words or pipe one in on stdin");
    }
    Ok(buf)
}
