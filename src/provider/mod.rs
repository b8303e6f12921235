//! Chat provider adapter.
//!
//! One canonical [`ChatRequest`] is mapped onto four provider protocols.
//! Each [`ProviderAdapter`] owns the wire details (endpoint, auth headers,
//! payload and response shapes); [`AiClient`] owns the shared HTTP client and
//! performs the call.
//!
//! ```
//! use pdb_advisor::provider::{adapter_for, Provider};
//!
//! let adapter = adapter_for(Provider::Gemini);
//! assert_eq!(
//!     adapter.endpoint_path("gemini-pro"),
//!     "/v1beta/models/gemini-pro:generateContent"
//! );
//! ```

pub mod claude;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod types;

pub use error::ProviderError;
pub use types::{
    ChatRequest, ChatResponse, FunctionDefinition, GenerationParams, Message, Provider,
    ProviderConfig, Role, ToolCall, ToolDefinition, Usage,
};

use reqwest::Client;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// Ceiling on a single outbound provider call.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Wire-format translation for one provider.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Base URL used when the config does not override it.
    fn default_base_url(&self) -> Option<&'static str>;

    /// Path (and query) appended to the base URL.
    fn endpoint_path(&self, model: &str) -> String;

    /// Authentication and protocol headers.
    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)>;

    /// Provider-specific request body.
    fn build_payload(
        &self,
        request: &ChatRequest,
        params: &GenerationParams,
    ) -> Result<Value, ProviderError>;

    /// Parse a 2xx response body into the canonical response.
    fn parse_response(&self, body: &[u8]) -> Result<ChatResponse, ProviderError>;

    /// Full endpoint URL for this config.
    fn endpoint(&self, config: &ProviderConfig) -> Result<String, ProviderError> {
        let base = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or(self.default_base_url())
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "{} requires base_url (https://<deployment>.openai.azure.com)",
                    self.provider()
                ))
            })?;
        let base = base.trim_end_matches('/');
        Ok(format!(
            "{}{}",
            base,
            self.endpoint_path(&config.model_or_default())
        ))
    }
}

/// Adapter for the given provider.
pub fn adapter_for(provider: Provider) -> Box<dyn ProviderAdapter> {
    match provider {
        Provider::Claude => Box::new(claude::ClaudeAdapter),
        Provider::OpenAI => Box::new(openai::OpenAIAdapter::public()),
        Provider::AzureOpenAI => Box::new(openai::OpenAIAdapter::azure()),
        Provider::Gemini => Box::new(gemini::GeminiAdapter),
    }
}

/// Shared outbound client. Safe for concurrent use.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    timeout: Duration,
}

impl AiClient {
    pub fn new() -> Self {
        Self::with_timeout(PROVIDER_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self { client, timeout }
    }

    /// Execute one chat completion.
    pub async fn chat(
        &self,
        config: &ProviderConfig,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration("api_key is required".to_string()));
        }

        let adapter = adapter_for(config.provider);
        let url = adapter.endpoint(config)?;
        let params = GenerationParams::resolve(config, request);
        let payload = adapter.build_payload(request, &params)?;

        tracing::debug!(
            provider = %config.provider,
            model = %params.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let started = Instant::now();
        let mut builder = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("content-type", "application/json");
        for (name, value) in adapter.headers(&config.api_key) {
            builder = builder.header(name, value);
        }

        let response = builder.json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout.as_secs())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(
                provider = %config.provider,
                status = status.as_u16(),
                "Provider returned an error"
            );
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed = std::panic::catch_unwind(AssertUnwindSafe(|| adapter.parse_response(&body)))
            .unwrap_or_else(|_| {
                tracing::error!(provider = %config.provider, "Panic while parsing provider response");
                Err(ProviderError::InvalidResponse(
                    "malformed provider response".to_string(),
                ))
            })?;

        tracing::info!(
            provider = %config.provider,
            duration_ms = started.elapsed().as_millis() as u64,
            tool_calls = parsed.message.tool_calls.as_ref().map_or(0, Vec::len),
            "Chat request completed"
        );

        Ok(parsed)
    }
}

impl Default for AiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Assistant message stamped with the current time.
pub(crate) fn assistant_message(
    id: Option<String>,
    content: String,
    tool_calls: Vec<ToolCall>,
) -> Message {
    Message {
        id,
        role: Role::Assistant,
        content,
        timestamp: Some(chrono::Utc::now()),
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        tool_call_id: None,
    }
}
