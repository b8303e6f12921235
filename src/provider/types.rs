//! Canonical chat types shared by every provider adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Default completion budget when neither request nor config sets one.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default sampling temperature when neither request nor config sets one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Supported chat-completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "azure-openai")]
    AzureOpenAI,
    #[serde(rename = "gemini")]
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
            Provider::AzureOpenAI => "azure-openai",
            Provider::Gemini => "gemini",
        }
    }

    /// Model used when the config leaves `model` empty.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-3-sonnet-20240229",
            Provider::OpenAI | Provider::AzureOpenAI => "gpt-4",
            Provider::Gemini => "gemini-pro",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAI),
            "azure-openai" => Ok(Provider::AzureOpenAI),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unsupported provider: {}", other)),
        }
    }
}

/// Credentials and generation defaults for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Resolved model name: configured value or the provider default.
    pub fn model_or_default(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool call, paired with the call by `tool_call_id`.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            timestamp: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// OpenAI-style function tool definition, the canonical tool shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Tools present and non-empty.
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Effective generation parameters after applying overrides and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    /// Request values win when strictly positive, then config values, then defaults.
    pub fn resolve(config: &ProviderConfig, request: &ChatRequest) -> Self {
        let max_tokens = [request.max_tokens, config.max_tokens]
            .into_iter()
            .flatten()
            .find(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let temperature = [request.temperature, config.temperature]
            .into_iter()
            .flatten()
            .find(|v| *v > 0.0)
            .unwrap_or(DEFAULT_TEMPERATURE);

        Self {
            model: config.model_or_default(),
            max_tokens,
            temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_wire_names() {
        let p: Provider = serde_json::from_str(r#""azure-openai""#).unwrap();
        assert_eq!(p, Provider::AzureOpenAI);
        assert_eq!(serde_json::to_string(&Provider::OpenAI).unwrap(), r#""openai""#);
        assert!(serde_json::from_str::<Provider>(r#""mistral""#).is_err());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!(" Gemini ".parse::<Provider>(), Ok(Provider::Gemini));
        assert!("".parse::<Provider>().is_err());
    }

    #[test]
    fn test_model_defaults() {
        let mut config = ProviderConfig::new(Provider::Gemini, "k");
        assert_eq!(config.model_or_default(), "gemini-pro");

        config.model = Some("  ".to_string());
        assert_eq!(config.model_or_default(), "gemini-pro");

        config.model = Some("gemini-1.5-pro".to_string());
        assert_eq!(config.model_or_default(), "gemini-1.5-pro");
    }

    #[test]
    fn test_generation_params_defaults() {
        let config = ProviderConfig::new(Provider::Claude, "k");
        let params = GenerationParams::resolve(&config, &ChatRequest::default());
        assert_eq!(params.max_tokens, 4000);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(params.model, "claude-3-sonnet-20240229");
    }

    #[test]
    fn test_generation_params_request_override_must_be_positive() {
        let mut config = ProviderConfig::new(Provider::OpenAI, "k");
        config.max_tokens = Some(1000);
        config.temperature = Some(0.3);

        let request = ChatRequest {
            max_tokens: Some(0),
            temperature: Some(0.0),
            ..Default::default()
        };
        let params = GenerationParams::resolve(&config, &request);
        assert_eq!(params.max_tokens, 1000);
        assert!((params.temperature - 0.3).abs() < f32::EPSILON);

        let request = ChatRequest {
            max_tokens: Some(256),
            temperature: Some(1.2),
            ..Default::default()
        };
        let params = GenerationParams::resolve(&config, &request);
        assert_eq!(params.max_tokens, 256);
        assert!((params.temperature - 1.2).abs() < f32::EPSILON);
    }
}
