//! # HTTP Front End
//!
//! Three routes in front of the dispatch core and the provider adapter.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Tool, prompt and resource dispatch
//! - `POST /ai/proxy`, `OPTIONS /ai/proxy` - Browser-facing chat proxy with CORS
//! - `GET /health` - Liveness and Kubernetes reachability
//!
//! ## Example
//!
//! ```no_run
//! use pdb_advisor::api::{create_router, AppState};
//! use pdb_advisor::config::AdvisorConfig;
//! use pdb_advisor::mcp::{McpServer, ServerInfo};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(AdvisorConfig::default());
//! let server = Arc::new(McpServer::new(ServerInfo::default()));
//!
//! // No Kubernetes collaborator: domain tools are not registered.
//! let state = Arc::new(AppState::new(config, server, None));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Request flow
//!
//! Every request is admitted in the same order:
//! 1. Client IP resolved from forwarding headers or the socket peer
//! 2. Authentication (`/mcp` only, when an API key is configured)
//! 3. Rate-limit admission
//! 4. Body read under the configured size ceiling
//! 5. Decode, then dispatch under a per-route deadline
//! 6. Audit event with outcome and latency

pub mod auth;
pub mod cors;
mod health;
mod mcp;
mod proxy;
pub mod types;

pub use health::{HealthChecks, HealthResponse};
pub use types::*;

use crate::audit::{AuditEvent, Auditor};
use crate::cluster::SharedCluster;
use crate::config::AdvisorConfig;
use crate::mcp::McpServer;
use crate::provider::AiClient;
use crate::ratelimit::{self, RateLimiter};
use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, request::Parts},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub const MCP_PATH: &str = "/mcp";
pub const PROXY_PATH: &str = "/ai/proxy";
pub const HEALTH_PATH: &str = "/health";

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<AdvisorConfig>,
    pub server: Arc<McpServer>,
    /// Absent when Kubernetes is disabled or unreachable at boot
    pub cluster: Option<SharedCluster>,
    pub rate_limiter: Arc<RateLimiter>,
    pub auditor: Auditor,
    pub ai_client: AiClient,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        config: Arc<AdvisorConfig>,
        server: Arc<McpServer>,
        cluster: Option<SharedCluster>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.transport.rate_limit));
        let auditor = Auditor::tracing(config.transport.enable_audit_log);
        let ai_client =
            AiClient::with_timeout(Duration::from_secs(config.server.proxy_timeout_seconds));
        let allowed_origins = config.transport.allowed_origins.clone();

        Self {
            config,
            server,
            cluster,
            rate_limiter,
            auditor,
            ai_client,
            allowed_origins,
        }
    }

    /// Replace the boundary auditor (tests capture events this way).
    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    /// Take a rate-limit token for the caller, auditing a denial.
    fn admit(&self, client_ip: &str, parts: &Parts) -> Result<(), ApiError> {
        if self.rate_limiter.allow(client_ip) {
            return Ok(());
        }
        tracing::warn!(client_ip = %client_ip, path = %parts.uri.path(), "Rate limit exceeded");
        self.auditor.emit(AuditEvent::RateLimit {
            client_ip: client_ip.to_string(),
            path: parts.uri.path().to_string(),
            method: parts.method.to_string(),
        });
        Err(ApiError::rate_limited())
    }

    fn body_limit(&self) -> usize {
        self.config.transport.body_limit()
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(MCP_PATH, post(mcp::handle))
        .route(PROXY_PATH, post(proxy::handle).options(proxy::preflight))
        .route(HEALTH_PATH, get(health::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn client_ip_of(parts: &Parts) -> String {
    let remote = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    ratelimit::client_ip(&parts.headers, remote)
}

/// Read the whole body, refusing anything above `limit` bytes.
async fn read_body(parts: &Parts, body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::payload_too_large(limit));
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "Failed to read request body");
        ApiError::payload_too_large(limit)
    })
}
