//! Provider abstraction: one trait, four wire-protocol adapters.
//!
//! Every adapter translates its wire format to and from the canonical types
//! defined here. The agent loop only ever sees `Provider`, `StreamChunk`,
//! `ChatResponse` — never a protocol-specific shape.

pub mod anthropic;
pub mod openai_chat;
pub mod openai_responses;
pub mod registry;
pub mod thread_run;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{CaretForgeError, Result};
use crate::message::{Message, ToolCall, ToolDefinition};

/// Turn a chunked HTTP response body into a stream of SSE event blocks,
/// splitting the running buffer on a blank line exactly as the wire format
/// delimits events. Each adapter then parses the `data:`/`event:` lines
/// within a block itself, since the three SSE-speaking protocols disagree
/// on event naming and payload shape.
pub(crate) fn sse_event_stream(resp: reqwest::Response) -> BoxStream<'static, Result<String>> {
    let byte_stream = resp.bytes_stream();
    futures::stream::unfold(
        (byte_stream, String::new()),
        |(mut byte_stream, mut buffer)| async move {
            loop {
                if let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer.drain(..pos + 2);
                    return Some((Ok(event), (byte_stream, buffer)));
                }
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(CaretForgeError::provider(None, e.to_string())),
                            (byte_stream, buffer),
                        ));
                    }
                    None => {
                        if buffer.trim().is_empty() {
                            return None;
                        }
                        let event = std::mem::take(&mut buffer);
                        return Some((Ok(event), (byte_stream, buffer)));
                    }
                }
            }
        },
    )
    .boxed()
}

/// Pull the payload out of an SSE event block's `data: ...` lines
/// (multi-line data fields are newline-joined per the SSE spec).
pub(crate) fn sse_data_lines(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|l| l.trim_start())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Pull the `event: ...` name out of an SSE event block, if present.
pub(crate) fn sse_event_name(event: &str) -> Option<&str> {
    event
        .lines()
        .find_map(|l| l.strip_prefix("event:"))
        .map(|l| l.trim())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: String,
    pub stream: Option<bool>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// A fragment of an in-progress tool call, as the wire format hands it to
/// us. `index` is the protocol's own notion of tool-call ordering,
/// normalized by the adapter (see [`ToolCallAssembler`]).
#[derive(Debug, Clone, Default)]
pub struct PartialToolCall {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_fragment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<PartialToolCall>>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

/// What a model speaks and how to reach it.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider's wire protocol can carry tool definitions at
    /// all. Variant D (async thread/run) cannot.
    fn supports_tools(&self) -> bool;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse>;

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>>;
}

/// Reassembles streamed tool-call fragments into complete [`ToolCall`]s.
///
/// Providers key fragments differently — OpenAI chat completions gives an
/// explicit `tool_calls[].index`, Anthropic keys off content-block index,
/// the Responses API keys off `item_id`/`call_id`. Each adapter normalizes
/// its own key into a zero-based "first appearance order" index before
/// handing fragments to this assembler, so the merge logic itself is
/// protocol-agnostic: the id is fixed on first non-empty sighting, and name
/// and arguments are concatenated in arrival order.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    order: Vec<usize>,
    id: std::collections::HashMap<usize, String>,
    name: std::collections::HashMap<usize, String>,
    arguments: std::collections::HashMap<usize, String>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, fragment: &PartialToolCall) {
        if !self.order.contains(&fragment.index) {
            self.order.push(fragment.index);
        }
        if let Some(id) = &fragment.id {
            if !id.is_empty() {
                self.id.entry(fragment.index).or_insert_with(|| id.clone());
            }
        }
        if let Some(name) = &fragment.name {
            self.name.entry(fragment.index).or_default().push_str(name);
        }
        if let Some(args) = &fragment.arguments_fragment {
            self.arguments
                .entry(fragment.index)
                .or_default()
                .push_str(args);
        }
    }

    /// Finalize in first-appearance order. A fragment with no id ever seen
    /// is assigned a generated one so the conversation invariant (every
    /// assistant tool_call has a non-empty id) still holds.
    pub fn finish(self) -> Vec<ToolCall> {
        self.order
            .into_iter()
            .map(|idx| {
                let id = self
                    .id
                    .get(&idx)
                    .cloned()
                    .unwrap_or_else(|| format!("call_{idx}"));
                let name = self.name.get(&idx).cloned().unwrap_or_default();
                let arguments = self.arguments.get(&idx).cloned().unwrap_or_default();
                ToolCall::new(id, name, arguments)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_single_call_from_fragments() {
        let mut asm = ToolCallAssembler::new();
        asm.ingest(&PartialToolCall {
            index: 0,
            id: Some("call_abc".into()),
            name: Some("read_".into()),
            arguments_fragment: Some("{\"pa".into()),
        });
        asm.ingest(&PartialToolCall {
            index: 0,
            id: None,
            name: Some("file".into()),
            arguments_fragment: Some("th\":\"x\"}".into()),
        });

        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments, "{\"path\":\"x\"}");
    }

    #[test]
    fn preserves_first_appearance_order_across_interleaved_fragments() {
        let mut asm = ToolCallAssembler::new();
        asm.ingest(&PartialToolCall {
            index: 1,
            id: Some("call_b".into()),
            name: Some("b".into()),
            arguments_fragment: None,
        });
        asm.ingest(&PartialToolCall {
            index: 0,
            id: Some("call_a".into()),
            name: Some("a".into()),
            arguments_fragment: None,
        });
        asm.ingest(&PartialToolCall {
            index: 1,
            id: None,
            name: None,
            arguments_fragment: Some("{}".into()),
        });

        let calls = asm.finish();
        assert_eq!(calls[0].id, "call_b");
        assert_eq!(calls[1].id, "call_a");
    }

    #[test]
    fn id_locks_on_first_nonempty_sighting() {
        let mut asm = ToolCallAssembler::new();
        asm.ingest(&PartialToolCall {
            index: 0,
            id: Some("call_real".into()),
            name: None,
            arguments_fragment: None,
        });
        asm.ingest(&PartialToolCall {
            index: 0,
            id: Some("".into()),
            name: None,
            arguments_fragment: None,
        });
        let calls = asm.finish();
        assert_eq!(calls[0].id, "call_real");
    }
}
