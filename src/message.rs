//! Canonical conversation data model shared by the agent loop and every
//! provider adapter. Provider wire formats are translated to and from this
//! model at the edge of each adapter — the agent loop never sees a
//! provider-specific type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four roles a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A model-emitted request to invoke a named function with JSON arguments.
///
/// Arguments stay an opaque string: providers stream them as a concatenated
/// JSON fragment, and only the tool executor parses them, so malformed JSON
/// from the model becomes a tool error rather than a transport error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse `arguments` as a JSON object. An unparseable string is replaced
    /// by the empty object — the tool itself validates required fields.
    pub fn parsed_arguments(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// A single turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Present iff `role == Tool`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Present only when `role == Assistant` and the model emitted calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A name, human description, and JSON-schema for a tool the model may call.
/// The definition set is fixed at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// An ordered sequence of messages.
///
/// Invariants (checked by [`Conversation::check_invariants`], used in tests):
/// index 0 is always the single system message; every tool message is
/// preceded by an assistant message whose tool_calls contains its id;
/// tool-call ids are unique across the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Generate a fresh, process-unique tool-call id.
    pub fn new_tool_call_id() -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }

    #[cfg(test)]
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        use std::collections::HashSet;

        if self.messages.is_empty() || self.messages[0].role != Role::System {
            return Err("index 0 must be the system message".into());
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut known_call_ids: HashSet<&str> = HashSet::new();

        for (i, msg) in self.messages.iter().enumerate() {
            if let Some(calls) = &msg.tool_calls {
                for call in calls {
                    if !seen_ids.insert(call.id.as_str()) {
                        return Err(format!("duplicate tool_call_id {}", call.id));
                    }
                    known_call_ids.insert(call.id.as_str());
                }
            }
            if msg.role == Role::Tool {
                let id = msg
                    .tool_call_id
                    .as_deref()
                    .ok_or_else(|| format!("tool message at {i} missing tool_call_id"))?;
                if !known_call_ids.contains(id) {
                    return Err(format!(
                        "tool message at {i} references unknown tool_call_id {id}"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariants_hold_for_well_formed_conversation() {
        let mut convo = Conversation::new("sys");
        convo.push(Message::user("hi"));
        convo.push(Message::assistant(
            "",
            vec![ToolCall::new("call_1", "read_file", "{}")],
        ));
        convo.push(Message::tool("call_1", "contents"));
        convo.push(Message::assistant("done", vec![]));

        assert!(convo.check_invariants().is_ok());
    }

    #[test]
    fn invariants_reject_missing_system_message() {
        let convo = Conversation {
            messages: vec![Message::user("hi")],
        };
        assert!(convo.check_invariants().is_err());
    }

    #[test]
    fn invariants_reject_duplicate_tool_call_ids() {
        let mut convo = Conversation::new("sys");
        convo.push(Message::assistant(
            "",
            vec![ToolCall::new("call_1", "a", "{}")],
        ));
        convo.push(Message::tool("call_1", "x"));
        convo.push(Message::assistant(
            "",
            vec![ToolCall::new("call_1", "b", "{}")],
        ));
        assert!(convo.check_invariants().is_err());
    }

    #[test]
    fn unparseable_arguments_become_empty_object() {
        let call = ToolCall::new("call_1", "read_file", "{not json");
        assert_eq!(call.parsed_arguments(), serde_json::json!({}));
    }
}
