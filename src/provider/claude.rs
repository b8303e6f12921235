//! Anthropic Claude adapter.
//!
//! Translates the canonical request into the Messages API format:
//! - first system message moves to the top-level `system` field
//! - OpenAI-style function tools become `{name, description, input_schema}`
//! - response `content[]` blocks are split into text and `tool_use` calls

use super::{
    assistant_message, ChatRequest, ChatResponse, GenerationParams, Message, Provider,
    ProviderAdapter, ProviderError, Role, ToolCall, ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude Messages API adapter.
pub struct ClaudeAdapter;

impl ClaudeAdapter {
    /// Text of the first system message, if any.
    fn extract_system_message(messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    fn convert_messages(messages: &[Message]) -> Vec<ClaudeMessage> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ClaudeMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn convert_tool(tool: &ToolDefinition) -> ClaudeTool {
        let schema = match &tool.function.parameters {
            Value::Object(map) if !map.is_empty() => tool.function.parameters.clone(),
            _ => json!({"type": "object", "properties": {}}),
        };
        ClaudeTool {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            input_schema: schema,
        }
    }

    fn translate_request(request: &ChatRequest, params: &GenerationParams) -> ClaudeRequest {
        let tools = request
            .tools
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|tools| tools.iter().map(Self::convert_tool).collect());

        ClaudeRequest {
            model: params.model.clone(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system: Self::extract_system_message(&request.messages),
            messages: Self::convert_messages(&request.messages),
            tools,
        }
    }

    fn translate_response(response: ClaudeResponse) -> ChatResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ClaudeContentBlock::Text { text: chunk } => text.push_str(&chunk),
                ClaudeContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    parameters: match input {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    },
                }),
                ClaudeContentBlock::Unknown => {}
            }
        }

        ChatResponse {
            message: assistant_message(response.id, text, tool_calls),
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens.saturating_add(u.output_tokens),
            }),
        }
    }
}

impl ProviderAdapter for ClaudeAdapter {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn default_base_url(&self) -> Option<&'static str> {
        Some("https://api.anthropic.com")
    }

    fn endpoint_path(&self, _model: &str) -> String {
        "/v1/messages".to_string()
    }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn build_payload(
        &self,
        request: &ChatRequest,
        params: &GenerationParams,
    ) -> Result<Value, ProviderError> {
        serde_json::to_value(Self::translate_request(request, params))
            .map_err(|e| ProviderError::Request(e.to_string()))
    }

    fn parse_response(&self, body: &[u8]) -> Result<ChatResponse, ProviderError> {
        let response: ClaudeResponse = serde_json::from_slice(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Claude response: {}", e))
        })?;
        Ok(Self::translate_response(response))
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    id: Option<String>,
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}
