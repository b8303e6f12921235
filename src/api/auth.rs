//! Shared-secret authentication for `/mcp`.

use axum::http::{header, HeaderMap};

/// Header carrying the key when no bearer token is sent.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredentials,
    InvalidCredentials,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredentials => "missing credentials",
            AuthFailure::InvalidCredentials => "invalid credentials",
        }
    }
}

/// Check `Authorization: Bearer <key>` or `X-API-Key: <key>`.
///
/// An empty configured key disables authentication.
pub fn authorize(headers: &HeaderMap, api_key: &str) -> Result<(), AuthFailure> {
    if api_key.is_empty() {
        return Ok(());
    }

    let presented = bearer_token(headers).or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    });

    match presented {
        None => Err(AuthFailure::MissingCredentials),
        Some(key) if constant_time_eq(key.as_bytes(), api_key.as_bytes()) => Ok(()),
        Some(_) => Err(AuthFailure::InvalidCredentials),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
