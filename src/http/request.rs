//! Request inspection helpers.
//!
//! # Responsibilities
//! - Name the request ID header shared by the ID layers and the handler
//! - Decide whether a request arrived over a secure channel
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (tower-http layers)
//! - Behind a TLS-terminating proxy, `X-Forwarded-Proto` is trusted

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID set by the ID layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Whether cookies for this request should be marked `Secure`.
pub fn is_secure(headers: &HeaderMap, tls_enabled: bool) -> bool {
    tls_enabled
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_secure() {
        let mut headers = HeaderMap::new();
        assert!(!is_secure(&headers, false));
        assert!(is_secure(&headers, true));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        assert!(is_secure(&headers, false));
    }

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }
}
