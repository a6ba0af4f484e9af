//! The agent loop: orchestrates model turns, tool dispatch, and permission
//! checks until the model produces a reply with no further tool calls.

use std::time::Instant;

use futures::StreamExt;
use serde_json::Value;

use crate::error::Result;
use crate::message::{Conversation, Message, ToolCall, ToolDefinition};
use crate::permission::{Decision, PermissionManager};
use crate::provider::{ChatOptions, Provider, ToolCallAssembler};
use crate::tool::{Tool, ToolContext};

/// Tools that touch the filesystem or spawn a shell, and therefore require
/// permission-manager approval before they run.
const GATED_TOOLS: [&str; 3] = ["write_file", "edit_file", "exec_shell"];

const MAX_ITERATIONS: u32 = 20;

const ITERATION_LIMIT_TEXT: &str = "[Agent reached maximum iteration limit]";

/// Fired as the loop makes progress. All three are no-ops by default;
/// a REPL driver overrides the ones it needs to render streaming output.
pub trait AgentObserver: Send + Sync {
    fn on_token(&self, _token: &str) {}
    fn on_tool_call(&self, _call: &ToolCall) {}
    fn on_tool_result(&self, _call: &ToolCall, _result: &str) {}
}

/// An observer that renders nothing. Used by callers that only want the
/// final [`AgentResult`], such as `--json` one-shot mode.
pub struct SilentObserver;
impl AgentObserver for SilentObserver {}

pub struct AgentResult {
    pub conversation: Conversation,
    pub final_content: String,
    pub tool_call_count: u32,
    pub duration_ms: u128,
}

pub struct AgentLoop<'a> {
    provider: &'a dyn Provider,
    tools: Vec<Box<dyn Tool>>,
    permissions: &'a mut PermissionManager,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        tools: Vec<Box<dyn Tool>>,
        permissions: &'a mut PermissionManager,
    ) -> Self {
        Self {
            provider,
            tools,
            permissions,
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Run the loop to completion. `system_prompt` is prepended as message
    /// index 0; `prefix` is the rest of the starting conversation (user
    /// turns, prior history) with no system message of its own.
    pub async fn run(
        &mut self,
        system_prompt: &str,
        prefix: Vec<Message>,
        model: &str,
        stream: bool,
        ctx: &ToolContext,
        observer: &dyn AgentObserver,
    ) -> Result<AgentResult> {
        let start = Instant::now();
        let mut conversation = Conversation::new(system_prompt);
        for msg in prefix {
            conversation.push(msg);
        }

        let tools = self.tool_definitions();
        let mut tool_call_count = 0u32;

        for iteration in 0..MAX_ITERATIONS {
            tracing::debug!(iteration, "agent loop iteration starting");

            let options = ChatOptions {
                model: model.to_string(),
                stream: Some(stream),
                temperature: None,
                max_tokens: None,
                tools: Some(tools.clone()),
            };

            let assistant_message = if stream {
                self.accumulate_stream(&conversation, &options, observer).await?
            } else {
                self.provider
                    .create_chat_completion(&conversation.messages, &options)
                    .await?
                    .message
            };

            conversation.push(assistant_message.clone());

            if !assistant_message.has_tool_calls() {
                tracing::debug!(iteration, "agent loop terminating: no tool calls");
                return Ok(AgentResult {
                    final_content: assistant_message.content,
                    conversation,
                    tool_call_count,
                    duration_ms: start.elapsed().as_millis(),
                });
            }

            let calls = assistant_message.tool_calls.clone().unwrap_or_default();
            for call in &calls {
                tool_call_count += 1;
                observer.on_tool_call(call);

                let args = call.parsed_arguments();

                if GATED_TOOLS.contains(&call.name.as_str()) {
                    if self.permissions.check(&call.name, &args) == Decision::Deny {
                        let text = "Permission denied by user.".to_string();
                        observer.on_tool_result(call, &text);
                        conversation.push(Message::tool(call.id.clone(), text));
                        continue;
                    }
                }

                let result_text = self.execute_tool(call, args, ctx).await;
                observer.on_tool_result(call, &result_text);
                conversation.push(Message::tool(call.id.clone(), result_text));
            }

            tracing::debug!(iteration, tool_calls = calls.len(), "agent loop iteration done");
        }

        Ok(AgentResult {
            final_content: ITERATION_LIMIT_TEXT.to_string(),
            conversation,
            tool_call_count,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    /// Run a single tool call, turning any failure into result text instead
    /// of propagating — a tool error is conversation content, not a
    /// loop-ending failure.
    async fn execute_tool(&self, call: &ToolCall, args: Value, ctx: &ToolContext) -> String {
        match self.find_tool(&call.name) {
            Some(tool) => match tool.execute(args, ctx).await {
                Ok(result) => result.output,
                Err(e) => format!("tool error: {e}"),
            },
            None => format!("tool error: unknown tool '{}'", call.name),
        }
    }

    async fn accumulate_stream(
        &self,
        conversation: &Conversation,
        options: &ChatOptions,
        observer: &dyn AgentObserver,
    ) -> Result<Message> {
        let mut stream = self
            .provider
            .create_streaming_chat_completion(&conversation.messages, options)
            .await?;

        let mut content = String::new();
        let mut assembler = ToolCallAssembler::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(text) = chunk.delta.content {
                observer.on_token(&text);
                content.push_str(&text);
            }
            if let Some(fragments) = chunk.delta.tool_calls {
                for fragment in &fragments {
                    assembler.ingest(fragment);
                }
            }
        }

        Ok(Message::assistant(content, assembler.finish()))
    }
}
