//! Shared helpers for pdb-advisor integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use pdb_advisor::api::{create_router, AppState};
use pdb_advisor::audit::{Auditor, MemoryAuditSink};
use pdb_advisor::cli::serve::build_server;
use pdb_advisor::cluster::{InMemoryCluster, SharedCluster};
use pdb_advisor::config::AdvisorConfig;
use serde_json::{json, Value};
use std::sync::Arc;

// =============================================================================
// App Builders
// =============================================================================

/// Defaults with rate limiting off so tests are not order-sensitive.
pub fn test_config() -> AdvisorConfig {
    let mut config = AdvisorConfig::default();
    config.transport.rate_limit.enabled = false;
    config
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub audit: Arc<MemoryAuditSink>,
}

/// Router over `config`, with domain tools when `cluster` is given.
pub fn build_app(config: AdvisorConfig, cluster: Option<InMemoryCluster>) -> TestApp {
    let audit = Arc::new(MemoryAuditSink::new());
    let auditor = Auditor::new(audit.clone(), true);
    let cluster: Option<SharedCluster> = cluster.map(|c| Arc::new(c) as SharedCluster);

    let server = build_server(cluster.clone(), auditor.clone()).expect("registration");
    let state = Arc::new(
        AppState::new(Arc::new(config), Arc::new(server), cluster).with_auditor(auditor),
    );
    TestApp {
        router: create_router(Arc::clone(&state)),
        state,
        audit,
    }
}

pub fn default_app() -> TestApp {
    build_app(test_config(), None)
}

// =============================================================================
// Request Builders
// =============================================================================

pub fn mcp_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn rpc(id: &str, method: &str, params: Value) -> Value {
    json!({ "id": id, "method": method, "params": params })
}

pub fn tool_call(id: &str, tool: &str, arguments: Value) -> Value {
    rpc(id, "tools/call", json!({ "name": tool, "arguments": arguments }))
}

pub fn proxy_request(body: &Value, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/ai/proxy")
        .header("content-type", "application/json");
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// =============================================================================
// Response Helpers
// =============================================================================

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Parse the JSON text inside a successful `tools/call` response.
pub fn tool_payload(response: &Value) -> Value {
    assert!(response.get("error").is_none(), "unexpected error: {}", response);
    let result = &response["result"];
    assert_eq!(result["is_error"], false, "tool failed: {}", result);
    let text = result["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}
