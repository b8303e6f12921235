//! Handler output and its canonical marshaling into content blocks.

use super::error::ToolError;
use super::protocol::{ContentBlock, ToolCallResult};
use serde::Serialize;
use serde_json::Value;

/// What a tool handler hands back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Sent as-is.
    Text(String),
    /// Pretty-printed (two-space indent) before sending.
    Json(Value),
    /// Sent as an error block with `is_error` set.
    Error(String),
}

impl ToolOutput {
    /// Serialize any value into a JSON output. A value that cannot be
    /// represented as JSON becomes an explanatory text block instead.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => ToolOutput::Json(v),
            Err(e) => ToolOutput::Text(format!("Error formatting result: {}", e)),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ToolOutput::Text(text.into())
    }
}

/// Turn a handler outcome into the `tools/call` result.
pub fn marshal(outcome: Result<ToolOutput, ToolError>) -> ToolCallResult {
    match outcome {
        Ok(ToolOutput::Text(text)) => ok(text),
        Ok(ToolOutput::Json(value)) => match serde_json::to_string_pretty(&value) {
            Ok(text) => ok(text),
            Err(e) => ok(format!("Error formatting result: {}", e)),
        },
        Ok(ToolOutput::Error(message)) => failed(message),
        Err(err) => failed(err.to_string()),
    }
}

fn ok(text: String) -> ToolCallResult {
    ToolCallResult {
        content: vec![ContentBlock::text(text)],
        is_error: false,
    }
}

pub(crate) fn failed(message: String) -> ToolCallResult {
    ToolCallResult {
        content: vec![ContentBlock::text(message)],
        is_error: true,
    }
}
