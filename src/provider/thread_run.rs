//! Variant D: an async thread/run protocol (Azure-OpenAI-assistants-shaped).
//! POST creates a thread and a run; the client polls the run with
//! exponential backoff until it leaves an in-progress state, then GETs the
//! thread's messages. `requires_action` is treated as a terminal failure —
//! this variant advertises `supports_tools() == false`, so the model is
//! never given a tool to call in the first place.
//!
//! Authentication is either a static `api-key` header, or — when no key is
//! configured — a short-lived bearer token obtained by spawning
//! `az account get-access-token` and caching the result in memory until
//! shortly before its stated expiry.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::process::Command;

use super::{
    sse_data_lines, sse_event_name, sse_event_stream, ChatOptions, ChatResponse, Delta,
    ModelInfo, Provider, StreamChunk,
};
use crate::error::{CaretForgeError, Result};
use crate::message::{Message, Role};

const POLL_INITIAL: Duration = Duration::from_millis(500);
const POLL_CEILING: Duration = Duration::from_secs(5);
const POLL_TIMEOUT: Duration = Duration::from_secs(120);
/// Refresh the cached token this far before its reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct ThreadRunProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    token_cache: Mutex<Option<CachedToken>>,
}

impl ThreadRunProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            token_cache: Mutex::new(None),
        }
    }

    async fn auth_header_value(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }

        {
            let cache = self.token_cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        // Single spawn attempt; a transient az CLI failure surfaces
        // directly as a provider error rather than being retried.
        let output = Command::new("az")
            .args(["account", "get-access-token", "--output", "json"])
            .output()
            .await
            .map_err(|e| CaretForgeError::provider(None, format!("az CLI spawn failed: {e}")))?;

        if !output.status.success() {
            return Err(CaretForgeError::provider(
                None,
                format!(
                    "az account get-access-token failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| CaretForgeError::provider(None, format!("bad az CLI output: {e}")))?;

        let token = parsed
            .get("accessToken")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CaretForgeError::provider(None, "az CLI output missing accessToken".to_string()))?
            .to_string();

        let expires_in = parsed
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(3600);
        let ttl = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);

        let mut cache = self.token_cache.lock().unwrap();
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + ttl,
        });

        Ok(token)
    }

    fn thread_messages_to_input(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System && m.role != Role::Tool)
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    _ => unreachable!(),
                };
                json!({"role": role, "content": m.content})
            })
            .collect()
    }

    async fn create_thread_and_run(&self, messages: &[Message], options: &ChatOptions) -> Result<(String, String)> {
        let auth = self.auth_header_value().await?;
        let instructions: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = json!({
            "assistant_id": options.model,
            "thread": {
                "messages": Self::thread_messages_to_input(messages),
            },
            "instructions": instructions,
        });

        let resp = self
            .client
            .post(format!("{}/threads/runs", self.base_url))
            .header("api-key", &auth)
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

        let thread_id = value
            .get("thread_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CaretForgeError::provider(None, "missing thread_id".to_string()))?
            .to_string();
        let run_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CaretForgeError::provider(None, "missing run id".to_string()))?
            .to_string();

        Ok((thread_id, run_id))
    }

    async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let auth = self.auth_header_value().await?;
        let deadline = Instant::now() + POLL_TIMEOUT;
        let mut backoff = POLL_INITIAL;

        loop {
            if Instant::now() > deadline {
                return Err(CaretForgeError::provider(None, "run polling timed out".to_string()));
            }

            let resp = self
                .client
                .get(format!("{}/threads/{thread_id}/runs/{run_id}", self.base_url))
                .header("api-key", &auth)
                .send()
                .await
                .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

            let value: Value = resp
                .json()
                .await
                .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

            match value.get("status").and_then(|v| v.as_str()) {
                Some("completed") => return Ok(()),
                Some("requires_action") => {
                    return Err(CaretForgeError::provider(
                        None,
                        "run requires action but this provider does not support tools".to_string(),
                    ))
                }
                Some("failed") | Some("cancelled") | Some("expired") | Some("incomplete") => {
                    return Err(CaretForgeError::provider(None, "run failed".to_string()))
                }
                _ => {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(POLL_CEILING);
                }
            }
        }
    }

    async fn fetch_latest_assistant_message(&self, thread_id: &str) -> Result<String> {
        let auth = self.auth_header_value().await?;
        let resp = self
            .client
            .get(format!(
                "{}/threads/{thread_id}/messages?order=desc&limit=10",
                self.base_url
            ))
            .header("api-key", &auth)
            .send()
            .await
            .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

        let value: Value = resp
            .json()
            .await
            .map_err(|e| CaretForgeError::provider(None, e.to_string()))?;

        let messages = value
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| CaretForgeError::provider(None, "no messages on thread".to_string()))?;

        let latest = messages
            .iter()
            .find(|m| m.get("role").and_then(|v| v.as_str()) == Some("assistant"))
            .ok_or_else(|| CaretForgeError::provider(None, "no assistant messages on thread".to_string()))?;

        let text = latest
            .get("content")
            .and_then(|v| v.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter(|p| p.get("type").and_then(|v| v.as_str()) == Some("text"))
                    .filter_map(|p| p.pointer("/text/value").and_then(|v| v.as_str()))
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(text)
    }
}

#[async_trait]
impl Provider for ThreadRunProvider {
    fn name(&self) -> &str {
        "thread-run"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatResponse> {
        let (thread_id, run_id) = self.create_thread_and_run(messages, options).await?;
        self.poll_run(&thread_id, &run_id).await?;
        let text = self.fetch_latest_assistant_message(&thread_id).await?;

        Ok(ChatResponse {
            message: Message::assistant(text, vec![]),
            usage: None,
            finish_reason: Some("completed".to_string()),
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let auth = self.auth_header_value().await?;
        let instructions: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let body = json!({
            "assistant_id": options.model,
            "thread": {
                "messages": Self::thread_messages_to_input(messages),
            },
            "instructions": instructions,
            "stream": true,
        });

        let resp = self
            .client
            .post(format!("{}/threads/runs", self.base_url))
            .header("api-key", &auth)
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
            let name = sse_event_name(&event).unwrap_or_default().to_string();
            let data = sse_data_lines(&event)?;
            let value: Value = match serde_json::from_str(&data) {
                Ok(v) => v,
                Err(e) => return Some(Err(CaretForgeError::provider(None, e.to_string()))),
            };

            match name.as_str() {
                "thread.message.delta" => {
                    let text = value
                        .pointer("/delta/content/0/text/value")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    Some(Ok(StreamChunk {
                        delta: Delta {
                            content: text,
                            tool_calls: None,
                        },
                        finish_reason: None,
                    }))
                }
                "thread.run.completed" => Some(Ok(StreamChunk {
                    delta: Delta::default(),
                    finish_reason: Some("completed".to_string()),
                })),
                "thread.run.failed" => Some(Err(CaretForgeError::provider(None, "run failed".to_string()))),
                _ => None,
            }
        });

        Ok(stream.boxed())
    }
}
