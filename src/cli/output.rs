//! `--json` output: a thin serialize-and-print layer over the agent result.
//! Intentionally unambitious — formatting is out of scope beyond this shape.

use serde::Serialize;

use crate::agent::AgentResult;
use crate::message::Message;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonTurn<'a> {
    pub task: &'a str,
    pub model: &'a str,
    pub provider: &'a str,
    pub final_content: &'a str,
    pub tool_call_count: u32,
    pub duration_ms: u128,
    pub messages: &'a [Message],
}

impl<'a> JsonTurn<'a> {
    pub fn from_result(task: &'a str, provider: &'a str, model: &'a str, result: &'a AgentResult) -> Self {
        Self {
            task,
            model,
            provider,
            final_content: &result.final_content,
            tool_call_count: result.tool_call_count,
            duration_ms: result.duration_ms,
            messages: &result.conversation.messages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonError {
    pub error: String,
}

pub fn print_json_turn(turn: &JsonTurn) {
    match serde_json::to_string_pretty(turn) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{{\"error\": \"failed to serialize result: {e}\"}}"),
    }
}

pub fn print_json_error(message: impl Into<String>) {
    let err = JsonError {
        error: message.into(),
    };
    println!(
        "{}",
        serde_json::to_string(&err).unwrap_or_else(|_| "{\"error\":\"unknown error\"}".to_string())
    );
}
