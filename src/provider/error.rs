//! Error types for provider calls.

use thiserror::Error;

/// Errors that can occur while calling a chat provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Outbound payload could not be built.
    #[error("Failed to build request: {0}")]
    Request(String),

    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Outbound call exceeded its deadline.
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// Provider answered with a non-2xx status.
    #[error("API request failed: {status} {reason} - {body}")]
    Upstream {
        status: u16,
        reason: String,
        body: String,
    },

    /// Provider response doesn't match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
