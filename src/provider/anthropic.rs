//! Variant B: Anthropic Messages API — top-level `system` field,
//! `tool_use`/`tool_result` content blocks, typed SSE events
//! (`content_block_start`/`delta`/`stop`, `message_delta`, `message_stop`).

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};

use super::{
    sse_data_lines, sse_event_name, sse_event_stream, ChatOptions, ChatResponse, Delta,
    ModelInfo, PartialToolCall, Provider, StreamChunk, Usage,
};
use crate::error::{CaretForgeError, Result};
use crate::message::{Message, Role, ToolCall};

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body(&self, messages: &[Message], options: &ChatOptions, stream: bool) -> Value {
        let system: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let wire_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_wire)
            .collect();

        let mut body = json!({
            "model": options.model,
            "system": system,
            "messages": wire_messages,
            "max_tokens": options.max_tokens.unwrap_or(4096),
            "stream": stream,
        });

        if let Some(tools) = &options.tools {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                }))
                .collect::<Vec<_>>());
        }
        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }
}

fn message_to_wire(msg: &Message) -> Value {
    match msg.role {
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Tool => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": msg.tool_call_id,
                "content": msg.content,
            }]
        }),
        Role::Assistant => {
            let mut blocks: Vec<Value> = Vec::new();
            if !msg.content.is_empty() {
                blocks.push(json!({"type": "text", "text": msg.content}));
            }
            if let Some(calls) = &msg.tool_calls {
                for call in calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.parsed_arguments(),
                    }));
                }
            }
            json!({"role": "assistant", "content": blocks})
        }
        Role::System => unreachable!("system messages are hoisted into the top-level field"),
    }
}

/// Anthropic's `stop_reason` carries its own vocabulary (`tool_use`,
/// `end_turn`, `max_tokens`, ...); normalize to the `tool_calls`/`stop`
/// pair the other adapters converge on so nothing downstream needs to know
/// about Anthropic-specific reason strings.
fn translate_stop_reason(reason: &str) -> String {
    if reason == "tool_use" {
        "tool_calls".to_string()
    } else {
        "stop".to_string()
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![
            ModelInfo {
                id: "claude-opus-4".to_string(),
                display_name: "Claude Opus 4".to_string(),
            },
            ModelInfo {
                id: "claude-sonnet-4".to_string(),
                display_name: "Claude Sonnet 4".to_string(),
            },
        ])
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let body = self.request_body(messages, options, false);

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CaretForgeError::provider(Some(status.as_u16()), text));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

        let blocks = value.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in &blocks {
            match block.get("type").and_then(|v| v.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall::new(
                        block.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
                        block.get("name").and_then(|v| v.as_str()).unwrap_or_default(),
                        block
                            .get("input")
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "{}".to_string()),
                    ));
                }
                _ => {}
            }
        }

        let usage = value.get("usage").map(|u| Usage {
            prompt_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            completion_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
        });

        let finish_reason = value
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .map(translate_stop_reason);

        Ok(ChatResponse {
            message: Message::assistant(text, tool_calls),
            usage,
            finish_reason,
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let body = self.request_body(messages, options, true);

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CaretForgeError::provider(Some(status.as_u16()), text));
        }

        let events = sse_event_stream(resp);

        // Anthropic's content_block index is already a stable first-appearance
        // key (blocks never reorder), so it is passed straight through as
        // the assembler's index.
        let stream = events.filter_map(|event| async move {
            let event = match event {
                Ok(e) => e,
                Err(e) => return Some(Err(e)),
            };
            let name = sse_event_name(&event).unwrap_or_default().to_string();
            let data = sse_data_lines(&event)?;
            let value: Value = match serde_json::from_str(&data) {
                Ok(v) => v,
                Err(e) => return Some(Err(CaretForgeError::provider(None, e.to_string()))),
            };

            match name.as_str() {
                "content_block_start" => {
                    let block = value.get("content_block")?;
                    if block.get("type").and_then(|v| v.as_str()) != Some("tool_use") {
                        return None;
                    }
                    let index = value.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                    Some(Ok(StreamChunk {
                        delta: Delta {
                            content: None,
                            tool_calls: Some(vec![PartialToolCall {
                                index,
                                id: block.get("id").and_then(|v| v.as_str()).map(str::to_string),
                                name: block.get("name").and_then(|v| v.as_str()).map(str::to_string),
                                arguments_fragment: None,
                            }]),
                        },
                        finish_reason: None,
                    }))
                }
                "content_block_delta" => {
                    let index = value.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                    let delta = value.get("delta")?;
                    match delta.get("type").and_then(|v| v.as_str()) {
                        Some("text_delta") => Some(Ok(StreamChunk {
                            delta: Delta {
                                content: delta
                                    .get("text")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string),
                                tool_calls: None,
                            },
                            finish_reason: None,
                        })),
                        Some("input_json_delta") => Some(Ok(StreamChunk {
                            delta: Delta {
                                content: None,
                                tool_calls: Some(vec![PartialToolCall {
                                    index,
                                    id: None,
                                    name: None,
                                    arguments_fragment: delta
                                        .get("partial_json")
                                        .and_then(|v| v.as_str())
                                        .map(str::to_string),
                                }]),
                            },
                            finish_reason: None,
                        })),
                        _ => None,
                    }
                }
                "message_delta" => {
                    let finish_reason = value
                        .pointer("/delta/stop_reason")
                        .and_then(|v| v.as_str())
                        .map(translate_stop_reason);
                    Some(Ok(StreamChunk {
                        delta: Delta::default(),
                        finish_reason,
                    }))
                }
                _ => None,
            }
        });

        Ok(stream.boxed())
    }
}
