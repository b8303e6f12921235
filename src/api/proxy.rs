//! `POST /ai/proxy` and its CORS preflight.

use super::{client_ip_of, cors, read_body, ApiError, AppState, ProxyRequest, ProxyResponse, PROXY_PATH};
use crate::audit::{duration_ms, AuditEvent, AuditResult};
use crate::provider::ProviderError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// OPTIONS /ai/proxy - 200 with CORS headers for an allowed origin, else 403.
pub async fn preflight(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    match cors::request_origin(&parts.headers) {
        Some(origin) if cors::origin_allowed(&state.allowed_origins, origin) => {
            let mut response = StatusCode::OK.into_response();
            cors::apply_preflight_headers(response.headers_mut(), origin);
            response
        }
        origin => {
            reject_origin(&state, &parts, origin.unwrap_or_default());
            ApiError::forbidden("Origin not allowed").into_response()
        }
    }
}

/// POST /ai/proxy - forward one chat completion to the configured provider.
pub async fn handle(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let client_ip = client_ip_of(&parts);

    let origin = cors::request_origin(&parts.headers).map(str::to_string);
    let allowed = origin
        .as_deref()
        .is_some_and(|o| cors::origin_allowed(&state.allowed_origins, o));
    if let (Some(o), false) = (origin.as_deref(), allowed) {
        reject_origin(&state, &parts, o);
    }

    let mut response = forward(&state, &parts, body, &client_ip, started).await;
    if let (Some(o), true) = (origin.as_deref(), allowed) {
        cors::apply_headers(response.headers_mut(), o);
    }
    response
}

async fn forward(
    state: &AppState,
    parts: &Parts,
    body: Body,
    client_ip: &str,
    started: Instant,
) -> Response {
    if let Err(rejection) = state.admit(client_ip, parts) {
        return envelope_error(rejection);
    }

    let bytes = match read_body(parts, body, state.body_limit()).await {
        Ok(bytes) => bytes,
        Err(rejection) => return envelope_error(rejection),
    };

    let payload: ProxyRequest = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            return envelope_error(ApiError::bad_request(format!("Invalid request: {}", e)))
        }
    };
    let config = match payload.config.resolve() {
        Ok(config) => config,
        Err(message) => return envelope_error(ApiError::bad_request(message)),
    };

    let deadline = state.config.server.proxy_timeout_seconds;
    let outcome = tokio::time::timeout(
        Duration::from_secs(deadline),
        state.ai_client.chat(&config, &payload.request),
    )
    .await
    .unwrap_or(Err(ProviderError::Timeout(deadline)));

    let elapsed = duration_ms(started.elapsed());
    state.auditor.emit(AuditEvent::AiProxy {
        provider: config.provider.to_string(),
        client_ip: client_ip.to_string(),
        origin: header_string(parts, header::ORIGIN),
        user_agent: header_string(parts, header::USER_AGENT),
        message_count: payload.request.messages.len(),
        duration_ms: elapsed,
        result: if outcome.is_ok() {
            AuditResult::Success
        } else {
            AuditResult::Error
        },
    });

    match outcome {
        Ok(chat) => {
            tracing::info!(provider = %config.provider, client_ip = %client_ip, duration_ms = elapsed, "AI proxy request completed");
            (StatusCode::OK, Json(ProxyResponse::ok(chat))).into_response()
        }
        Err(e) => {
            tracing::error!(provider = %config.provider, client_ip = %client_ip, error = %e, "AI proxy request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProxyResponse::failure(e.to_string())),
            )
                .into_response()
        }
    }
}

fn reject_origin(state: &AppState, parts: &Parts, origin: &str) {
    let client_ip = client_ip_of(parts);
    tracing::warn!(client_ip = %client_ip, origin = %origin, "CORS origin rejected");
    state.auditor.emit(AuditEvent::CorsRejected {
        client_ip,
        origin: origin.to_string(),
        path: PROXY_PATH.to_string(),
    });
}

/// Boundary rejection rendered in the proxy's `{success, error}` envelope.
fn envelope_error(err: ApiError) -> Response {
    let mut response = (err.status, Json(ProxyResponse::failure(err.message))).into_response();
    if err.status == StatusCode::TOO_MANY_REQUESTS {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }
    response
}

fn header_string(parts: &Parts, name: header::HeaderName) -> String {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
