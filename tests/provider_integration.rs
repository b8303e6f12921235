//! Provider adapters against mock upstreams.

use pdb_advisor::provider::{
    AiClient, ChatRequest, FunctionDefinition, Message, Provider, ProviderConfig, ProviderError,
    Role, ToolDefinition,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(provider: Provider, server: &MockServer) -> ProviderConfig {
    let mut config = ProviderConfig::new(provider, "k");
    config.base_url = Some(server.uri());
    config
}

fn conversation() -> ChatRequest {
    ChatRequest {
        messages: vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hi"),
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_claude_moves_system_prompt_to_top_level() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "k"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "system": "be brief",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": [{"type": "text", "text": "ok"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = AiClient::new()
        .chat(&config(Provider::Claude, &server), &conversation())
        .await
        .unwrap();
    assert_eq!(response.message.role, Role::Assistant);
    assert_eq!(response.message.content, "ok");
}

#[tokio::test]
async fn test_openai_passes_tools_with_auto_choice() {
    let server = MockServer::start().await;
    let tool = ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: "analyze_cluster_availability".to_string(),
            description: "Coverage report".to_string(),
            parameters: json!({"type": "object", "properties": {"namespace": {"type": "string"}}}),
        },
    };
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer k"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "tool_choice": "auto",
            "tools": [serde_json::to_value(&tool).unwrap()]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "analyze_cluster_availability",
                            "arguments": "{\"namespace\":\"prod\"}"
                        }
                    }]
                }
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = conversation();
    request.tools = Some(vec![tool]);
    let response = AiClient::new()
        .chat(&config(Provider::OpenAI, &server), &request)
        .await
        .unwrap();

    let calls = response.message.tool_calls.unwrap();
    assert_eq!(calls[0].name, "analyze_cluster_availability");
    assert_eq!(calls[0].parameters["namespace"], "prod");
    assert_eq!(response.usage.unwrap().total_tokens, 7);
}

#[tokio::test]
async fn test_azure_uses_deployment_path_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/gpt-4/chat/completions"))
        .and(query_param("api-version", "2024-02-15-preview"))
        .and(header("api-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "azure ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = AiClient::new()
        .chat(&config(Provider::AzureOpenAI, &server), &conversation())
        .await
        .unwrap();
    assert_eq!(response.message.content, "azure ok");
}

#[tokio::test]
async fn test_azure_without_base_url_is_configuration_error() {
    let config = ProviderConfig::new(Provider::AzureOpenAI, "k");
    let err = AiClient::new().chat(&config, &conversation()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn test_gemini_endpoint_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(header("x-goog-api-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "gemini ok"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = AiClient::new()
        .chat(&config(Provider::Gemini, &server), &conversation())
        .await
        .unwrap();
    assert_eq!(response.message.content, "gemini ok");
    assert_eq!(response.message.role, Role::Assistant);
}

#[tokio::test]
async fn test_upstream_error_status_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = AiClient::new()
        .chat(&config(Provider::Claude, &server), &conversation())
        .await
        .unwrap_err();
    match err {
        ProviderError::Upstream { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_response_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = AiClient::new()
        .chat(&config(Provider::OpenAI, &server), &conversation())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]})),
        )
        .mount(&server)
        .await;

    let err = AiClient::with_timeout(Duration::from_millis(100))
        .chat(&config(Provider::Claude, &server), &conversation())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)));
}
