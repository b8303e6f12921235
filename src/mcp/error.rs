//! Dispatch and handler errors.

use super::protocol::{INTERNAL_ERROR, METHOD_NOT_FOUND};
use crate::cluster::ClusterError;
use thiserror::Error;

/// Errors produced while routing a request. Rendered into the response
/// `error` body; the HTTP status stays 200.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid {method} params: {detail}")]
    InvalidParams { method: String, detail: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("request deadline exceeded after {0}s")]
    DeadlineExceeded(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    pub fn invalid_params(method: &str, err: impl std::fmt::Display) -> Self {
        McpError::InvalidParams {
            method: method.to_string(),
            detail: err.to_string(),
        }
    }

    /// Wire error code.
    pub fn code(&self) -> i32 {
        match self {
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            _ => INTERNAL_ERROR,
        }
    }
}

/// Registration failures. The registry is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} name must not be empty")]
    EmptyKey { kind: &'static str },

    #[error("{kind} '{key}' is already registered")]
    Duplicate { kind: &'static str, key: String },
}

/// Failure returned by a tool handler. Surfaces as an `is_error` result,
/// never as a response error.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::InvalidParams(err.to_string())
    }
}
