//! Variant A: OpenAI-style chat completions, Azure-deployment-shaped —
//! `{endpoint}/openai/deployments/{model}/chat/completions?api-version=...`,
//! an `api-key` header, `tools`/`tool_calls[]`, SSE `data: {json}` events
//! terminated by a literal `data: [DONE]`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};

use super::{
    sse_data_lines, sse_event_stream, ChatOptions, ChatResponse, Delta, ModelInfo,
    PartialToolCall, Provider, StreamChunk, Usage,
};
use crate::error::{CaretForgeError, Result};
use crate::message::{Message, Role, ToolCall};

const DEFAULT_API_VERSION: &str = "2024-06-01";
const DEFAULT_PATH: &str = "/chat/completions";

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    path: String,
}

impl OpenAiChatProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: Option<String>,
        path: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            path: path.unwrap_or_else(|| DEFAULT_PATH.to_string()),
        }
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/openai/deployments/{model}{}?api-version={}",
            self.endpoint, self.path, self.api_version
        )
    }

    fn request_body(&self, messages: &[Message], options: &ChatOptions, stream: bool) -> Value {
        let wire_messages: Vec<Value> = messages.iter().map(message_to_wire).collect();

        let mut body = json!({
            "model": options.model,
            "messages": wire_messages,
            "stream": stream,
        });

        if let Some(tools) = &options.tools {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                }))
                .collect::<Vec<_>>());
        }
        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }
}

fn message_to_wire(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content}),
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
        Role::Assistant => {
            let mut v = json!({"role": "assistant", "content": msg.content});
            if let Some(calls) = &msg.tool_calls {
                v["tool_calls"] = json!(calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments},
                    }))
                    .collect::<Vec<_>>());
            }
            v
        }
    }
}

fn wire_tool_calls_to_canonical(value: &Value) -> Vec<ToolCall> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|c| {
                    ToolCall::new(
                        c.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
                        c.pointer("/function/name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default(),
                        c.pointer("/function/arguments")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Provider for OpenAiChatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![
            ModelInfo {
                id: "gpt-4o".to_string(),
                display_name: "GPT-4o".to_string(),
            },
            ModelInfo {
                id: "gpt-4o-mini".to_string(),
                display_name: "GPT-4o mini".to_string(),
            },
            ModelInfo {
                id: "gpt-4-turbo".to_string(),
                display_name: "GPT-4 Turbo".to_string(),
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
            .post(self.url(&options.model))
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

        let choice = value
            .pointer("/choices/0")
            .ok_or_else(|| CaretForgeError::provider(None, "missing choices[0]".to_string()))?;

        let content = choice
            .pointer("/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let tool_calls = choice
            .pointer("/message/tool_calls")
            .map(wire_tool_calls_to_canonical)
            .unwrap_or_default();

        let message = Message::assistant(content, tool_calls);

        let usage = value.get("usage").map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            completion_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        });

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(ChatResponse {
            message,
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
            .post(self.url(&options.model))
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

        let stream = events.filter_map(|event| async move {
            let event = match event {
                Ok(e) => e,
                Err(e) => return Some(Err(e)),
            };
            let data = sse_data_lines(&event)?;
            if data.trim() == "[DONE]" {
                return None;
            }

            let value: Value = match serde_json::from_str(&data) {
                Ok(v) => v,
                Err(e) => return Some(Err(CaretForgeError::provider(None, e.to_string()))),
            };

            let delta_value = value.pointer("/choices/0/delta").cloned().unwrap_or(json!({}));
            let content = delta_value
                .get("content")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let tool_calls = delta_value.get("tool_calls").and_then(|v| v.as_array()).map(|arr| {
                arr.iter()
                    .map(|c| PartialToolCall {
                        index: c.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                        id: c.get("id").and_then(|v| v.as_str()).map(str::to_string),
                        name: c
                            .pointer("/function/name")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        arguments_fragment: c
                            .pointer("/function/arguments")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    })
                    .collect()
            });

            let finish_reason = value
                .pointer("/choices/0/finish_reason")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            Some(Ok(StreamChunk {
                delta: Delta {
                    content,
                    tool_calls,
                },
                finish_reason,
            }))
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_deployment_path_and_api_version() {
        let p = OpenAiChatProvider::new("https://my-resource.openai.azure.com", "key", None, None);
        assert_eq!(
            p.url("gpt-4o"),
            "https://my-resource.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn url_honors_overridden_api_version_and_path() {
        let p = OpenAiChatProvider::new(
            "https://host",
            "key",
            Some("2025-01-01".to_string()),
            Some("/custom".to_string()),
        );
        assert_eq!(
            p.url("m"),
            "https://host/openai/deployments/m/custom?api-version=2025-01-01"
        );
    }

    #[test]
    fn wire_tool_calls_parse_id_name_arguments() {
        let value = json!([{
            "id": "call_1",
            "function": {"name": "read_file", "arguments": "{\"path\":\"x\"}"}
        }]);
        let calls = wire_tool_calls_to_canonical(&value);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "read_file");
    }
}
