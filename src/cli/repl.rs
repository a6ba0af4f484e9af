//! Interactive REPL — the `chat` subcommand and the bare invocation with no
//! positional args. History persists for the life of the process; slash
//! commands operate on it directly rather than going through the agent loop.

use std::io::{self, Write as _};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use crate::agent::{AgentLoop, AgentObserver};
use crate::cli::{build_permissions, build_tools, RunOptions};
use crate::config::Config;
use crate::disclaimer;
use crate::indexer::expand::{complete_at_path, expand_at_refs};
use crate::indexer::FileIndex;
use crate::message::Message;
use crate::provider::registry::{self, Resolved};
use crate::system_prompt::SYSTEM_PROMPT;
use crate::tool::ToolContext;

/// Messages kept in the last `/compact`, not counting the system prompt.
const COMPACT_KEEP: usize = 4;

struct ReplObserver;

impl AgentObserver for ReplObserver {
    fn on_token(&self, token: &str) {
        print!("{token}");
        let _ = io::stdout().flush();
    }

    fn on_tool_call(&self, call: &crate::message::ToolCall) {
        eprintln!("\n{} {}", "»".cyan(), call.name.cyan());
    }

    fn on_tool_result(&self, call: &crate::message::ToolCall, _result: &str) {
        eprintln!("{} {}", "«".dimmed(), call.name.dimmed());
    }
}

pub async fn execute(opts: RunOptions) -> Result<()> {
    disclaimer::print_if_interactive();

    let config = Config::load().await.context("failed to load config")?;
    let mut resolved = registry::resolve(&config, opts.provider.as_deref(), opts.model.as_deref())
        .map_err(|e| anyhow::anyhow!(e))?;

    let cwd = std::env::current_dir()?.to_string_lossy().to_string();
    let index = FileIndex::build(cwd.clone()).await;
    let ctx = ToolContext::new(cwd);
    let mut permissions = build_permissions(&opts);
    let observer = ReplObserver;

    let mut history: Vec<Message> = Vec::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let raw = line.trim_end_matches(['\n', '\r']);

        if let Some(tab_pos) = raw.find('\t') {
            let before = &raw[..tab_pos];
            print_completions(before, &index);
            continue;
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            "exit" | "quit" | "q" | "/exit" | "/quit" => break,
            "/help" => {
                print_help();
                continue;
            }
            "/clear" => {
                history.clear();
                println!("conversation cleared");
                continue;
            }
            "/compact" => {
                compact(&mut history);
                println!("kept last {} messages", history.len());
                continue;
            }
            "/model" => {
                print_models(resolved.provider.as_ref()).await;
                continue;
            }
            _ => {}
        }

        if let Some(spec) = trimmed.strip_prefix("/model ") {
            match switch_model(&config, spec.trim(), &resolved.provider_name) {
                Ok(new_resolved) => {
                    println!("switched to {}/{}", new_resolved.provider_name, new_resolved.model);
                    resolved = new_resolved;
                }
                Err(e) => eprintln!("error: {e}"),
            }
            continue;
        }

        let (enriched, _refs) = expand_at_refs(trimmed, &index).await;
        history.push(Message::user(enriched));

        let tools = build_tools();
        let mut agent = AgentLoop::new(resolved.provider.as_ref(), tools, &mut permissions);
        let result = agent
            .run(
                SYSTEM_PROMPT,
                history.clone(),
                &resolved.model,
                opts.stream,
                &ctx,
                &observer,
            )
            .await;

        match result {
            Ok(result) => {
                println!();
                history = result
                    .conversation
                    .messages
                    .into_iter()
                    .skip(1) // drop the system message; run() re-adds it next turn
                    .collect();
            }
            Err(e) => {
                eprintln!("error: {e}");
            }
        }
    }

    Ok(())
}

fn compact(history: &mut Vec<Message>) {
    if history.len() > COMPACT_KEEP {
        let drop = history.len() - COMPACT_KEEP;
        history.drain(..drop);
    }
}

fn print_completions(before: &str, index: &FileIndex) {
    let candidates = complete_at_path(before, index);
    if candidates.is_empty() {
        eprintln!("(no matches)");
    } else {
        eprintln!("{}", candidates.join("  "));
    }
}

fn print_help() {
    println!("/help             show this message");
    println!("/clear            drop conversation history");
    println!("/compact          keep only the last {COMPACT_KEEP} messages");
    println!("/model            list available models for the current provider");
    println!("/model <id>       switch model (accepts provider/model form)");
    println!("/exit, /quit      leave the REPL");
    println!("exit, quit, q     also leave the REPL");
}

async fn print_models(provider: &dyn crate::provider::Provider) {
    match provider.list_models().await {
        Ok(models) => {
            for m in models {
                println!("{}  {}", m.id, m.display_name);
            }
        }
        Err(e) => eprintln!("error listing models: {e}"),
    }
}

/// `spec` is either a bare model id (keeps the current provider) or a
/// `provider/model` pair that switches both.
fn switch_model(config: &Config, spec: &str, current_provider: &str) -> Result<Resolved> {
    let (provider_name, model_id) = match spec.split_once('/') {
        Some((p, m)) => (p.to_string(), m),
        None => (current_provider.to_string(), spec),
    };
    registry::resolve(config, Some(&provider_name), Some(model_id)).map_err(|e| anyhow::anyhow!(e))
}
