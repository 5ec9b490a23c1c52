//! Cross-origin headers.
//!
//! Every response carries these, including failures, so browsers can read
//! the status of a rejected call.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
};
use axum::http::{HeaderMap, Method};

use crate::http::response::Draft;
use crate::session::properties::USER_PROPERTIES_HEADER;

/// Request header selecting the session variant without debugger hooks.
pub const NODEBUG_HEADER: &str = "ws.nodebug";

/// Methods advertised to a preflight.
const ALLOWED_METHODS: &str = "GET, DELETE, POST, PUT, PATCH, OPTIONS";

/// 20 days, in seconds.
const MAX_AGE: &str = "1728000";

/// Whether the request asks for the no-debug variant.
///
/// A preflight cannot carry the header itself, only announce it.
pub fn nodebug_requested(method: &Method, headers: &HeaderMap) -> bool {
    if method == Method::OPTIONS {
        let announced = headers
            .get(ACCESS_CONTROL_REQUEST_HEADERS)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains(NODEBUG_HEADER));
        if announced {
            return true;
        }
    }
    headers.contains_key(NODEBUG_HEADER)
}

/// Set the CORS headers for a request.
pub fn apply_cors(draft: &mut Draft, headers: &HeaderMap, nodebug: bool) {
    let origin = header_str(headers, ORIGIN.as_str()).unwrap_or("*");
    draft.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    draft.set_header(ACCESS_CONTROL_MAX_AGE, MAX_AGE);
    draft.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");

    if headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
        draft.set_header(ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS);
    }

    let exposed = if nodebug {
        format!("{NODEBUG_HEADER}, {USER_PROPERTIES_HEADER}")
    } else {
        USER_PROPERTIES_HEADER.to_string()
    };
    draft.set_header(ACCESS_CONTROL_EXPOSE_HEADERS, &exposed);

    if let Some(requested) = header_str(headers, ACCESS_CONTROL_REQUEST_HEADERS.as_str()) {
        draft.set_header(ACCESS_CONTROL_ALLOW_HEADERS, requested);
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (name, value) in pairs {
            h.insert(*name, HeaderValue::from_static(value));
        }
        h
    }

    #[test]
    fn test_nodebug_detection() {
        assert!(nodebug_requested(&Method::GET, &headers(&[("ws.nodebug", "1")])));
        assert!(!nodebug_requested(&Method::GET, &HeaderMap::new()));
        assert!(nodebug_requested(
            &Method::OPTIONS,
            &headers(&[("access-control-request-headers", "content-type, WS.NoDebug")])
        ));
        assert!(!nodebug_requested(
            &Method::GET,
            &headers(&[("access-control-request-headers", "ws.nodebug")])
        ));
    }

    #[test]
    fn test_simple_request() {
        let mut draft = Draft::new();
        apply_cors(&mut draft, &HeaderMap::new(), false);
        assert_eq!(draft.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(draft.headers[ACCESS_CONTROL_MAX_AGE], "1728000");
        assert_eq!(draft.headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(draft.headers[ACCESS_CONTROL_EXPOSE_HEADERS], "ws.userproperties");
        assert!(draft.headers.get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert!(draft.headers.get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
    }

    #[test]
    fn test_preflight_echoes_request() {
        let mut draft = Draft::new();
        let h = headers(&[
            ("origin", "https://app.example"),
            ("access-control-request-method", "PUT"),
            ("access-control-request-headers", "content-type"),
        ]);
        apply_cors(&mut draft, &h, true);
        assert_eq!(draft.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
        assert_eq!(draft.headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, DELETE, POST, PUT, PATCH, OPTIONS");
        assert_eq!(draft.headers[ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
        assert_eq!(draft.headers[ACCESS_CONTROL_EXPOSE_HEADERS], "ws.nodebug, ws.userproperties");
    }
}
