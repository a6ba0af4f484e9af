//! A `Provider` scripted with a fixed sequence of responses, one per turn.
//! Panics if the agent loop asks for more turns than were scripted —
//! a test author forgot a response, not a runtime condition to handle
//! gracefully.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use caretforge::error::{CaretForgeError, Result};
use caretforge::message::{Message, ToolCall};
use caretforge::provider::{ChatOptions, ChatResponse, Delta, ModelInfo, PartialToolCall, Provider, StreamChunk};

pub struct MockProvider {
    turns: Mutex<Vec<Message>>,
}

impl MockProvider {
    /// `turns[n]` is the assistant message returned on the (n+1)th call.
    pub fn new(turns: Vec<Message>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().rev().collect()),
        }
    }

    pub fn single(message: Message) -> Self {
        Self::new(vec![message])
    }

    fn next_turn(&self) -> Result<Message> {
        self.turns
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| CaretForgeError::provider(None, "mock provider ran out of scripted turns".to_string()))
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "mock-1".to_string(),
            display_name: "Mock Model".to_string(),
        }])
    }

    async fn create_chat_completion(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResponse> {
        let message = self.next_turn()?;
        Ok(ChatResponse {
            message,
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        _messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<BoxStream<'static, Result<StreamChunk>>> {
        let message = self.next_turn()?;
        let tool_calls = message.tool_calls.clone().unwrap_or_default();
        let content = message.content;

        let mut chunks = Vec::new();
        if !content.is_empty() {
            chunks.push(StreamChunk {
                delta: Delta {
                    content: Some(content),
                    tool_calls: None,
                },
                finish_reason: None,
            });
        }
        for (index, call) in tool_calls.iter().enumerate() {
            chunks.push(StreamChunk {
                delta: Delta {
                    content: None,
                    tool_calls: Some(vec![PartialToolCall {
                        index,
                        id: Some(call.id.clone()),
                        name: Some(call.name.clone()),
                        arguments_fragment: Some(call.arguments.clone()),
                    }]),
                },
                finish_reason: None,
            });
        }
        chunks.push(StreamChunk {
            delta: Delta::default(),
            finish_reason: Some("stop".to_string()),
        });

        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

/// Build a scripted assistant message carrying one tool call.
pub fn assistant_with_tool_call(name: &str, arguments: &str, call_id: &str) -> Message {
    Message::assistant("", vec![ToolCall::new(call_id, name, arguments)])
}
