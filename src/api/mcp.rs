//! `POST /mcp` handler.

use super::{auth, client_ip_of, read_body, ApiError, AppState, MCP_PATH};
use crate::audit::{duration_ms, AuditEvent, AuditResult};
use crate::logging::generate_request_id;
use crate::mcp::{McpError, Request as McpRequest, RequestContext, Response as McpResponse};
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub async fn handle(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let client_ip = client_ip_of(&parts);

    if let Err(failure) = auth::authorize(&parts.headers, &state.config.transport.api_key) {
        tracing::warn!(client_ip = %client_ip, reason = failure.as_str(), "Rejected MCP request");
        state.auditor.emit(AuditEvent::AuthFailure {
            client_ip,
            path: MCP_PATH.to_string(),
            reason: failure.as_str().to_string(),
        });
        return ApiError::unauthorized().into_response();
    }

    if let Err(rejection) = state.admit(&client_ip, &parts) {
        return rejection.into_response();
    }

    let bytes = match read_body(&parts, body, state.body_limit()).await {
        Ok(bytes) => bytes,
        Err(rejection) => return rejection.into_response(),
    };

    let mut rpc: McpRequest = match serde_json::from_slice(&bytes) {
        Ok(rpc) => rpc,
        Err(e) => {
            tracing::debug!(client_ip = %client_ip, error = %e, "Malformed MCP request");
            return ApiError::bad_request(format!("Invalid request: {}", e)).into_response();
        }
    };
    if rpc.id.trim().is_empty() {
        rpc.id = generate_request_id();
    }

    let request_id = rpc.id.clone();
    let method = rpc.method.clone();
    let ctx = RequestContext::new(request_id.clone(), client_ip.clone());
    let deadline = state.config.server.mcp_timeout_seconds;

    let response = match tokio::time::timeout(
        Duration::from_secs(deadline),
        state.server.handle_request(ctx, rpc),
    )
    .await
    {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                deadline_seconds = deadline,
                "MCP request deadline exceeded"
            );
            McpResponse::error(request_id.clone(), &McpError::DeadlineExceeded(deadline))
        }
    };

    let (result, error) = match &response.error {
        Some(body) => (AuditResult::Error, Some(body.message.clone())),
        None => (AuditResult::Success, None),
    };
    let elapsed = duration_ms(started.elapsed());
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        client_ip = %client_ip,
        duration_ms = elapsed,
        "MCP request handled"
    );
    state.auditor.emit(AuditEvent::McpRequest {
        method,
        request_id,
        client_ip,
        duration_ms: elapsed,
        result,
        error,
    });

    Json(response).into_response()
}
