//! OpenAI and Azure OpenAI adapter.
//!
//! Both speak the chat-completions format; they differ in endpoint layout and
//! authentication header only.

use super::{
    assistant_message, ChatRequest, ChatResponse, GenerationParams, Message, Provider,
    ProviderAdapter, ProviderError, ToolCall, ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const AZURE_API_VERSION: &str = "2024-02-15-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Public,
    Azure,
}

/// Chat-completions adapter for the public API or an Azure deployment.
pub struct OpenAIAdapter {
    flavor: Flavor,
}

impl OpenAIAdapter {
    pub fn public() -> Self {
        Self {
            flavor: Flavor::Public,
        }
    }

    pub fn azure() -> Self {
        Self {
            flavor: Flavor::Azure,
        }
    }

    fn translate_request<'a>(
        request: &'a ChatRequest,
        params: &GenerationParams,
    ) -> OpenAIRequest<'a> {
        let tools = request.tools.as_ref().filter(|t| !t.is_empty());
        let tool_choice = tools.map(|_| {
            request
                .tool_choice
                .clone()
                .unwrap_or_else(|| Value::String("auto".to_string()))
        });

        OpenAIRequest {
            model: params.model.clone(),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            tools,
            tool_choice,
        }
    }

    fn translate_response(response: OpenAIResponse) -> Result<ChatResponse, ProviderError> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("response contained no choices".to_string())
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                parameters: decode_arguments(&call.function.name, &call.function.arguments),
                id: call.id,
                name: call.function.name,
            })
            .collect();

        Ok(ChatResponse {
            message: assistant_message(
                response.id,
                choice.message.content.unwrap_or_default(),
                tool_calls,
            ),
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

/// Tool arguments arrive as a JSON-encoded string. Undecodable arguments are
/// logged and replaced with an empty map so the call itself is kept.
fn decode_arguments(tool: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!(tool = %tool, "Tool call arguments are not a JSON object");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(tool = %tool, error = %e, "Failed to decode tool call arguments");
            Map::new()
        }
    }
}

impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> Provider {
        match self.flavor {
            Flavor::Public => Provider::OpenAI,
            Flavor::Azure => Provider::AzureOpenAI,
        }
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self.flavor {
            Flavor::Public => Some("https://api.openai.com"),
            Flavor::Azure => None,
        }
    }

    fn endpoint_path(&self, model: &str) -> String {
        match self.flavor {
            Flavor::Public => "/v1/chat/completions".to_string(),
            Flavor::Azure => format!(
                "/openai/deployments/{}/chat/completions?api-version={}",
                model, AZURE_API_VERSION
            ),
        }
    }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        match self.flavor {
            Flavor::Public => vec![("Authorization", format!("Bearer {}", api_key))],
            Flavor::Azure => vec![("api-key", api_key.to_string())],
        }
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
        let response: OpenAIResponse = serde_json::from_slice(body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse {} response: {}",
                self.provider(),
                e
            ))
        })?;
        Self::translate_response(response)
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: String,
    messages: Vec<OpenAIMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIOutgoingToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenAIOutgoingToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: OpenAIOutgoingFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIOutgoingFunction<'a> {
    name: &'a str,
    /// JSON-encoded, as the API expects.
    arguments: String,
}

impl<'a> From<&'a Message> for OpenAIMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls = message
            .tool_calls
            .as_ref()
            .filter(|calls| !calls.is_empty())
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| OpenAIOutgoingToolCall {
                        id: &call.id,
                        call_type: "function",
                        function: OpenAIOutgoingFunction {
                            name: &call.name,
                            arguments: Value::Object(call.parameters.clone()).to_string(),
                        },
                    })
                    .collect()
            });
        Self {
            role: message.role.as_str(),
            content: &message.content,
            tool_calls,
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: Option<String>,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FunctionDefinition, ProviderConfig, Role};
    use serde_json::json;

    fn params() -> GenerationParams {
        GenerationParams::resolve(
            &ProviderConfig::new(Provider::OpenAI, "k"),
            &ChatRequest::default(),
        )
    }

    fn tool() -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "analyze_cluster_availability".to_string(),
                description: "Analyze".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        }
    }

    #[test]
    fn test_messages_forwarded_with_system() {
        let request = ChatRequest {
            messages: vec![
                Message::new(Role::System, "sys"),
                Message::new(Role::User, "hi"),
            ],
            ..Default::default()
        };
        let payload = OpenAIAdapter::public()
            .build_payload(&request, &params())
            .unwrap();
        assert_eq!(
            payload["messages"],
            json!([{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}])
        );
        assert_eq!(payload["model"], "gpt-4");
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_call_history_is_forwarded() {
        let mut parameters = Map::new();
        parameters.insert("namespace".to_string(), json!("prod"));
        let mut assistant = Message::new(Role::Assistant, "");
        assistant.tool_calls = Some(vec![ToolCall {
            id: "call_1".to_string(),
            name: "analyze_cluster_availability".to_string(),
            parameters,
        }]);
        let mut result = Message::new(Role::Tool, "{\"total\": 3}");
        result.tool_call_id = Some("call_1".to_string());

        let request = ChatRequest {
            messages: vec![Message::new(Role::User, "hi"), assistant, result],
            tools: Some(vec![tool()]),
            ..Default::default()
        };
        let payload = OpenAIAdapter::public()
            .build_payload(&request, &params())
            .unwrap();

        let messages = &payload["messages"];
        assert!(messages[0].get("tool_calls").is_none());
        assert!(messages[0].get("tool_call_id").is_none());
        assert_eq!(
            messages[1]["tool_calls"],
            json!([{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": "analyze_cluster_availability",
                    "arguments": "{\"namespace\":\"prod\"}"
                }
            }])
        );
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_tools_default_to_auto_choice() {
        let request = ChatRequest {
            messages: vec![Message::new(Role::User, "hi")],
            tools: Some(vec![tool()]),
            ..Default::default()
        };
        let payload = OpenAIAdapter::public()
            .build_payload(&request, &params())
            .unwrap();
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(
            payload["tools"][0]["function"]["name"],
            "analyze_cluster_availability"
        );
        assert_eq!(payload["tools"][0]["type"], "function");
    }

    #[test]
    fn test_explicit_tool_choice_is_kept() {
        let request = ChatRequest {
            messages: vec![Message::new(Role::User, "hi")],
            tools: Some(vec![tool()]),
            tool_choice: Some(json!("none")),
            ..Default::default()
        };
        let payload = OpenAIAdapter::azure()
            .build_payload(&request, &params())
            .unwrap();
        assert_eq!(payload["tool_choice"], "none");
    }

    #[test]
    fn test_parse_tool_calls_decodes_arguments() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "list", "arguments": "{\"namespace\":\"prod\"}"}},
                        {"id": "call_2", "type": "function",
                         "function": {"name": "broken", "arguments": "{not json"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        });

        let response = OpenAIAdapter::public()
            .parse_response(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(response.message.content, "");
        let calls = response.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].parameters["namespace"], "prod");
        assert_eq!(calls[1].name, "broken");
        assert!(calls[1].parameters.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 7);
    }

    #[test]
    fn test_parse_empty_choices_is_error() {
        let err = OpenAIAdapter::public()
            .parse_response(br#"{"choices": []}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_auth_headers_differ_by_flavor() {
        assert_eq!(
            OpenAIAdapter::public().headers("sk"),
            vec![("Authorization", "Bearer sk".to_string())]
        );
        assert_eq!(
            OpenAIAdapter::azure().headers("az"),
            vec![("api-key", "az".to_string())]
        );
    }
}
