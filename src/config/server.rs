//! Server configuration

use serde::{Deserialize, Serialize};

/// HTTP listener and request-lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to every `/mcp` request
    pub mcp_timeout_seconds: u64,
    /// Deadline applied to every `/ai/proxy` request and its outbound call
    pub proxy_timeout_seconds: u64,
    /// Upper bound on draining in-flight requests at shutdown
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mcp_timeout_seconds: 30,
            proxy_timeout_seconds: 120,
            shutdown_grace_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.mcp_timeout_seconds, 30);
        assert_eq!(config.proxy_timeout_seconds, 120);
        assert_eq!(config.shutdown_grace_seconds, 10);
    }
}
