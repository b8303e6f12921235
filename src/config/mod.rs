//! Configuration module for pdb-advisor
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`PDB_ADVISOR_*`, `MCP_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use pdb_advisor::config::AdvisorConfig;
//!
//! let config = AdvisorConfig::default();
//! assert_eq!(config.server.port, 8080);
//!
//! let toml = r#"
//! [server]
//! port = 9000
//!
//! [transport]
//! api_key = "secret"
//! "#;
//! let config: AdvisorConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.transport.api_key, "secret");
//! ```

pub mod error;
pub mod kubernetes;
pub mod logging;
pub mod server;
pub mod transport;

pub use error::ConfigError;
pub use kubernetes::KubernetesConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;
pub use transport::{parse_allowed_origins, RateLimitConfig, TransportConfig, CORS_ORIGINS_ENV};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the advisor server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdvisorConfig {
    /// HTTP listener and deadlines
    pub server: ServerConfig,
    /// Boundary protection: CORS, rate limits, auth, body size
    pub transport: TransportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Kubernetes collaborator
    pub kubernetes: KubernetesConfig,
}

impl AdvisorConfig {
    /// Read `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are ignored and the current value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("PDB_ADVISOR_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("PDB_ADVISOR_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("PDB_ADVISOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PDB_ADVISOR_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(origins) = std::env::var(CORS_ORIGINS_ENV) {
            self.transport.allowed_origins = parse_allowed_origins(Some(&origins));
        }
        if let Ok(key) = std::env::var("MCP_API_KEY") {
            self.transport.api_key = key;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        let rate_limit = &self.transport.rate_limit;
        if rate_limit.enabled {
            if !(rate_limit.rps > 0.0) {
                return Err(ConfigError::Validation {
                    field: "transport.rate_limit.rps".to_string(),
                    message: "rps must be positive".to_string(),
                });
            }
            if rate_limit.burst == 0 {
                return Err(ConfigError::Validation {
                    field: "transport.rate_limit.burst".to_string(),
                    message: "burst must be at least 1".to_string(),
                });
            }
        }

        if self.server.mcp_timeout_seconds == 0 || self.server.proxy_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "server".to_string(),
                message: "request timeouts must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Example configuration written by `config init`.
pub const EXAMPLE_CONFIG: &str = r#"# pdb-advisor configuration

[server]
host = "0.0.0.0"
port = 8080
mcp_timeout_seconds = 30
proxy_timeout_seconds = 120
shutdown_grace_seconds = 10

[transport]
# Overridden by MCP_CORS_ALLOWED_ORIGINS when set
allowed_origins = ["http://localhost:3000"]
enable_audit_log = true
# Empty disables bearer / X-API-Key authentication on /mcp
api_key = ""
max_request_body_size = 1048576

[transport.rate_limit]
enabled = true
rps = 10.0
burst = 20
per_client = true
cleanup_interval_seconds = 300

[logging]
level = "info"
format = "pretty"

# [logging.components]
# provider = "debug"

[kubernetes]
enabled = true
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_advisor_config_defaults() {
        let config = AdvisorConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.kubernetes.enabled);
        assert!(config.transport.api_key.is_empty());
        assert_eq!(config.transport.max_request_body_size, 1 << 20);
    }

    #[test]
    fn test_config_parse_example() {
        let config: AdvisorConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.transport.rate_limit.burst, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 9090").unwrap();

        let config = AdvisorConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.mcp_timeout_seconds, 30);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = AdvisorConfig::load(Some(Path::new("/nonexistent/pdb-advisor.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nport = ").unwrap();

        let result = AdvisorConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_burst() {
        let mut config = AdvisorConfig::default();
        config.transport.rate_limit.burst = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "transport.rate_limit.burst"
        ));
    }

    #[test]
    fn test_validate_ignores_disabled_rate_limit() {
        let mut config = AdvisorConfig::default();
        config.transport.rate_limit.enabled = false;
        config.transport.rate_limit.rps = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_env_override_origins() {
        std::env::set_var(CORS_ORIGINS_ENV, "https://console.example.com, https://ops.example.com");
        let config = AdvisorConfig::default().with_env_overrides();
        std::env::remove_var(CORS_ORIGINS_ENV);

        assert_eq!(
            config.transport.allowed_origins,
            vec!["https://console.example.com", "https://ops.example.com"]
        );
    }
}
