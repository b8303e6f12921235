//! Health check endpoint handler.

use crate::api::AppState;
use crate::cluster;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on the Kubernetes check so a hung API server cannot stall
/// liveness.
pub const KUBERNETES_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub initialized: bool,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub mcp: bool,
    pub kubernetes: bool,
}

/// GET /health - Liveness plus a best-effort Kubernetes probe.
///
/// Status is `degraded` only when the cluster check times out.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (kubernetes, timed_out) = match &state.cluster {
        Some(cluster) => {
            match tokio::time::timeout(KUBERNETES_CHECK_TIMEOUT, cluster::probe(cluster.as_ref()))
                .await
            {
                Ok(reachable) => (reachable, false),
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = KUBERNETES_CHECK_TIMEOUT.as_millis() as u64,
                        "Kubernetes health check timed out"
                    );
                    (false, true)
                }
            }
        }
        None => (false, false),
    };
    let status = if timed_out { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        initialized: state.server.is_initialized(),
        timestamp: Utc::now(),
        checks: HealthChecks {
            mcp: true,
            kubernetes,
        },
    })
}
