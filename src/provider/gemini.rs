//! Google Gemini adapter.

use super::{
    assistant_message, ChatRequest, ChatResponse, GenerationParams, Provider, ProviderAdapter,
    ProviderError, Role, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `generateContent` adapter. System messages are not forwarded and the
/// assistant role is renamed to `model`.
pub struct GeminiAdapter;

impl GeminiAdapter {
    fn translate_request(request: &ChatRequest, params: &GenerationParams) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| GeminiContent {
                role: match m.role {
                    Role::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: params.max_tokens,
                temperature: params.temperature,
            },
        }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn default_base_url(&self) -> Option<&'static str> {
        Some("https://generativelanguage.googleapis.com")
    }

    fn endpoint_path(&self, model: &str) -> String {
        format!("/v1beta/models/{}:generateContent", model)
    }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("x-goog-api-key", api_key.to_string())]
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
        let response: GeminiResponse = serde_json::from_slice(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response contained no candidate text".to_string())
            })?;

        Ok(ChatResponse {
            message: assistant_message(None, text, Vec::new()),
            usage: response.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Message, ProviderConfig};
    use serde_json::json;

    #[test]
    fn test_payload_drops_system_and_renames_assistant() {
        let mut config = ProviderConfig::new(Provider::Gemini, "k");
        config.max_tokens = Some(512);
        let request = ChatRequest {
            messages: vec![
                Message::new(Role::System, "sys"),
                Message::new(Role::User, "hi"),
                Message::new(Role::Assistant, "hello"),
                Message::new(Role::Tool, "3 pdbs"),
            ],
            ..Default::default()
        };
        let params = GenerationParams::resolve(&config, &request);

        let payload = GeminiAdapter.build_payload(&request, &params).unwrap();
        assert_eq!(
            payload["contents"],
            json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello"}]},
                {"role": "user", "parts": [{"text": "3 pdbs"}]}
            ])
        );
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 512);
        assert!(payload["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_parse_first_candidate_text() {
        let body = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "42"}]}}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 1, "totalTokenCount": 3}
        });
        let response = GeminiAdapter
            .parse_response(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(response.message.content, "42");
        assert_eq!(response.message.role, Role::Assistant);
        assert!(response.message.tool_calls.is_none());
        assert_eq!(response.usage.unwrap().total_tokens, 3);
    }

    #[test]
    fn test_parse_without_candidates_is_error() {
        let err = GeminiAdapter.parse_response(br#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_api_key_header() {
        assert_eq!(
            GeminiAdapter.headers("g"),
            vec![("x-goog-api-key", "g".to_string())]
        );
    }
}
