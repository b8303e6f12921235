//! Transport boundary configuration: origins, rate limits, auth, body caps.

use serde::{Deserialize, Serialize};

/// Environment variable holding the comma-separated CORS allow-list.
pub const CORS_ORIGINS_ENV: &str = "MCP_CORS_ALLOWED_ORIGINS";

/// Default request body ceiling (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: i64 = 1 << 20;

/// Origins allowed when nothing is configured. Development only.
pub const DEFAULT_DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:8080",
];

/// Token-bucket admission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Sustained requests per second
    pub rps: f64,
    /// Bucket capacity
    pub burst: u32,
    /// One bucket per client IP instead of a single global bucket
    pub per_client: bool,
    /// Sweep period for idle client buckets
    pub cleanup_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 10.0,
            burst: 20,
            per_client: true,
            cleanup_interval_seconds: 300,
        }
    }
}

/// Settings for the HTTP boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub enable_audit_log: bool,
    /// Shared secret for `/mcp`; empty disables authentication
    pub api_key: String,
    pub max_request_body_size: i64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
            rate_limit: RateLimitConfig::default(),
            enable_audit_log: true,
            api_key: String::new(),
            max_request_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl TransportConfig {
    /// Body ceiling in bytes; non-positive values fall back to the default.
    pub fn body_limit(&self) -> usize {
        if self.max_request_body_size <= 0 {
            DEFAULT_MAX_BODY_SIZE as usize
        } else {
            self.max_request_body_size as usize
        }
    }
}

fn default_origins() -> Vec<String> {
    DEFAULT_DEV_ORIGINS.iter().map(|s| s.to_string()).collect()
}

/// Parse a comma-separated allow-list, trimming entries.
///
/// Missing or blank input yields the development default list.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        default_origins()
    } else {
        origins
    }
}
