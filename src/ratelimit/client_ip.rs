use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Resolve the caller's IP for rate limiting and audit records.
///
/// Order: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket peer address. Returns `"unknown"` when none is available.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
