//! Structured logging setup and request correlation helpers.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Build filter directives string from LoggingConfig
///
/// Produces `"<level>,pdb_advisor::<component>=<level>,..."`.
///
/// # Examples
///
/// ```
/// use pdb_advisor::config::LoggingConfig;
/// use pdb_advisor::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config.components.insert("provider".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,pdb_advisor::provider=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    std::iter::once(config.level.clone())
        .chain(
            config
                .components
                .iter()
                .map(|(component, level)| format!("pdb_advisor::{}={}", component, level)),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured directives when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter_str = build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Generate a new request ID using UUID v4
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
