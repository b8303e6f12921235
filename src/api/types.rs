//! Wire types for the HTTP surface.

use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderConfig};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

/// Provider settings as sent by the browser client.
///
/// `provider` stays a string so a missing or unknown value is reported as a
/// 400 with a readable message instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProxyProviderConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, alias = "baseUrl", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, alias = "maxTokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProxyProviderConfig {
    /// Resolve into an adapter config. Errors carry the 400 message.
    pub fn resolve(&self) -> Result<ProviderConfig, String> {
        if self.provider.trim().is_empty() {
            return Err("provider is required".to_string());
        }
        if self.api_key.trim().is_empty() {
            return Err("api_key is required".to_string());
        }
        let provider: Provider = self.provider.parse()?;

        Ok(ProviderConfig {
            provider,
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

/// Body of `POST /ai/proxy`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyRequest {
    pub config: ProxyProviderConfig,
    pub request: ChatRequest,
}

/// Envelope returned by `/ai/proxy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ChatResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    pub fn ok(data: ChatResponse) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Boundary rejection (auth, admission, size, decode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Request body exceeds {} bytes", limit),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                error: &self.message,
            }),
        )
            .into_response();
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_requires_provider_and_key() {
        let missing_provider = ProxyProviderConfig {
            api_key: "k".to_string(),
            ..Default::default()
        };
        assert_eq!(missing_provider.resolve().unwrap_err(), "provider is required");

        let missing_key = ProxyProviderConfig {
            provider: "claude".to_string(),
            ..Default::default()
        };
        assert_eq!(missing_key.resolve().unwrap_err(), "api_key is required");

        let unknown = ProxyProviderConfig {
            provider: "mistral".to_string(),
            api_key: "k".to_string(),
            ..Default::default()
        };
        assert!(unknown.resolve().is_err());
    }

    #[test]
    fn test_proxy_request_accepts_camel_case_config() {
        let body = json!({
            "config": {"provider": "openai", "apiKey": "k", "baseUrl": "http://localhost:1"},
            "request": {"messages": [{"role": "user", "content": "hi"}]}
        });
        let request: ProxyRequest = serde_json::from_value(body).unwrap();
        let config = request.config.resolve().unwrap();
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:1"));
    }

    #[test]
    fn test_failure_envelope_omits_data() {
        let body = serde_json::to_value(ProxyResponse::failure("boom")).unwrap();
        assert_eq!(body, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited().into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
