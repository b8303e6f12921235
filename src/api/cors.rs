//! Origin gate for the browser-facing proxy.

use axum::http::{header, HeaderMap, HeaderValue};

/// Allow-list entry that admits every origin. Development only.
pub const WILDCARD: &str = "*";

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const MAX_AGE: &str = "86400";

/// Exact match against the allow-list, or a literal `*` entry.
pub fn origin_allowed(allowed: &[String], origin: &str) -> bool {
    !origin.is_empty() && allowed.iter().any(|o| o == WILDCARD || o == origin)
}

/// The request's `Origin` header, if present and readable.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Headers for an admitted origin. Unencodable origins get none.
pub fn apply_headers(headers: &mut HeaderMap, origin: &str) {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

/// [`apply_headers`] plus the preflight cache lifetime.
pub fn apply_preflight_headers(headers: &mut HeaderMap, origin: &str) {
    apply_headers(headers, origin);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_only() {
        let allowed = list(&["http://localhost:3000"]);
        assert!(origin_allowed(&allowed, "http://localhost:3000"));
        assert!(!origin_allowed(&allowed, "http://localhost:3000/"));
        assert!(!origin_allowed(&allowed, "http://evil.example"));
        assert!(!origin_allowed(&allowed, ""));
    }

    #[test]
    fn test_wildcard_allows_any() {
        assert!(origin_allowed(&list(&["*"]), "https://anything.example"));
    }

    #[test]
    fn test_preflight_headers() {
        let mut headers = HeaderMap::new();
        apply_preflight_headers(&mut headers, "http://localhost:5173");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }
}
