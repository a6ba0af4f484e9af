//! Variant C: OpenAI Responses API — `instructions` field, a heterogeneous
//! `input[]` list (including `function_call_output` items), a flattened
//! tool schema, and named streaming events
//! (`response.output_text.delta`, `response.output_item.added`,
//! `response.function_call_arguments.delta`/`.done`, `response.completed`).

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

pub struct OpenAiResponsesProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiResponsesProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/openai/v1/responses", self.endpoint)
    }

    fn request_body(&self, messages: &[Message], options: &ChatOptions, stream: bool) -> Value {
        let instructions: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut input: Vec<Value> = Vec::new();
        for msg in messages.iter().filter(|m| m.role != Role::System) {
            match msg.role {
                Role::User => input.push(json!({"role": "user", "content": msg.content})),
                Role::Tool => input.push(json!({
                    "type": "function_call_output",
                    "call_id": msg.tool_call_id,
                    "output": msg.content,
                })),
                Role::Assistant => {
                    if !msg.content.is_empty() {
                        input.push(json!({"role": "assistant", "content": msg.content}));
                    }
                    if let Some(calls) = &msg.tool_calls {
                        for call in calls {
                            input.push(json!({
                                "type": "function_call",
                                "call_id": call.id,
                                "name": call.name,
                                "arguments": call.arguments,
                            }));
                        }
                    }
                }
                Role::System => unreachable!(),
            }
        }

        let mut body = json!({
            "model": options.model,
            "instructions": instructions,
            "input": input,
            "stream": stream,
        });

        if let Some(tools) = &options.tools {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }))
                .collect::<Vec<_>>());
        }
        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiResponsesProvider {
    fn name(&self) -> &str {
        "openai-responses"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "gpt-4o".to_string(),
            display_name: "GPT-4o (Responses)".to_string(),
        }])
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let body = self.request_body(messages, options, false);

        let resp = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
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

        let items = value.get("output").and_then(|v| v.as_array()).cloned().unwrap_or_default();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for item in &items {
            match item.get("type").and_then(|v| v.as_str()) {
                Some("message") => {
                    if let Some(parts) = item.get("content").and_then(|v| v.as_array()) {
                        for part in parts {
                            if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
                                text.push_str(t);
                            }
                        }
                    }
                }
                Some("function_call") => {
                    tool_calls.push(ToolCall::new(
                        item.get("call_id").and_then(|v| v.as_str()).unwrap_or_default(),
                        item.get("name").and_then(|v| v.as_str()).unwrap_or_default(),
                        item.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}"),
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
            .get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string);

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
            .post(self.url())
            .header("api-key", &self.api_key)
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

        // The Responses API keys a function_call's lifecycle events by
        // `item_id`, not by a small integer, and carries a *separate*
        // `call_id` that is the identifier downstream tool-result matching
        // needs (the outward tool-call id). We fold `item_id` into a
        // first-appearance index for the shared assembler's dense usize key,
        // while still fixing the emitted id to `call_id` on first sighting.
        // Threaded as unfold state rather than a closure capture so the
        // resulting stream stays trivially `'static`.
        let stream = futures::stream::unfold(
            (events, Vec::<String>::new()),
            |(mut events, mut seen)| async move {
                loop {
                    let event = match events.next().await {
                        Some(Ok(e)) => e,
                        Some(Err(e)) => return Some((Err(e), (events, seen))),
                        None => return None,
                    };

                    let name = sse_event_name(&event).unwrap_or_default().to_string();
                    let Some(data) = sse_data_lines(&event) else {
                        continue;
                    };
                    let value: Value = match serde_json::from_str(&data) {
                        Ok(v) => v,
                        Err(e) => {
                            return Some((
                                Err(CaretForgeError::provider(None, e.to_string())),
                                (events, seen),
                            ))
                        }
                    };

                    let chunk = match name.as_str() {
                        "response.output_text.delta" => Some(StreamChunk {
                            delta: Delta {
                                content: value
                                    .get("delta")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string),
                                tool_calls: None,
                            },
                            finish_reason: None,
                        }),
                        "response.output_item.added" => value.get("item").and_then(|item| {
                            if item.get("type").and_then(|v| v.as_str()) != Some("function_call") {
                                return None;
                            }
                            let item_id = item.get("id").and_then(|v| v.as_str())?;
                            let call_id = item.get("call_id").and_then(|v| v.as_str()).unwrap_or(item_id);
                            let index = index_for(&mut seen, item_id);
                            Some(StreamChunk {
                                delta: Delta {
                                    content: None,
                                    tool_calls: Some(vec![PartialToolCall {
                                        index,
                                        id: Some(call_id.to_string()),
                                        name: item
                                            .get("name")
                                            .and_then(|v| v.as_str())
                                            .map(str::to_string),
                                        arguments_fragment: None,
                                    }]),
                                },
                                finish_reason: None,
                            })
                        }),
                        "response.function_call_arguments.delta" => {
                            value.get("item_id").and_then(|v| v.as_str()).map(|item_id| {
                                let index = index_for(&mut seen, item_id);
                                StreamChunk {
                                    delta: Delta {
                                        content: None,
                                        tool_calls: Some(vec![PartialToolCall {
                                            index,
                                            id: None,
                                            name: None,
                                            arguments_fragment: value
                                                .get("delta")
                                                .and_then(|v| v.as_str())
                                                .map(str::to_string),
                                        }]),
                                    },
                                    finish_reason: None,
                                }
                            })
                        }
                        "response.completed" => Some(StreamChunk {
                            delta: Delta::default(),
                            finish_reason: Some("completed".to_string()),
                        }),
                        // .done carries the already-concatenated arguments for
                        // the item; skipped to avoid double-appending on top
                        // of what the .delta events already assembled.
                        "response.function_call_arguments.done" => None,
                        _ => None,
                    };

                    if let Some(chunk) = chunk {
                        return Some((Ok(chunk), (events, seen)));
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

fn index_for(seen: &mut Vec<String>, call_id: &str) -> usize {
    if let Some(pos) = seen.iter().position(|id| id == call_id) {
        pos
    } else {
        seen.push(call_id.to_string());
        seen.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_openai_v1_responses_path() {
        let p = OpenAiResponsesProvider::new("https://host", "key");
        assert_eq!(p.url(), "https://host/openai/v1/responses");
    }

    #[test]
    fn index_for_assigns_stable_first_appearance_index() {
        let mut seen = Vec::new();
        assert_eq!(index_for(&mut seen, "item_a"), 0);
        assert_eq!(index_for(&mut seen, "item_b"), 1);
        assert_eq!(index_for(&mut seen, "item_a"), 0);
    }
}
