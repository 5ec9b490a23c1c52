//! Response assembly.
//!
//! # Responsibilities
//! - Accumulate status, headers and body while a request is dispatched
//! - Map gateway errors to status codes and challenge headers
//! - Convert into an axum `Response` at the very end
//!
//! # Design Decisions
//! - Headers set before a failure (CORS, properties) survive it
//! - Error responses carry no body unless the operation supplied one

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::content::{ContentKind, Encoded};
use crate::error::GatewayError;

/// A response under construction.
#[derive(Debug, Clone)]
pub struct Draft {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Default for Draft {
    fn default() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: Bytes::new() }
    }
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header from a string, dropping values that are not valid
    /// header text.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "Invalid header value dropped"),
        }
    }

    pub fn append_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.append(name, v);
            }
            Err(_) => tracing::warn!(header = %name, "Invalid header value dropped"),
        }
    }

    pub fn no_cache(&mut self) {
        self.headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
        self.headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        self.headers.insert(EXPIRES, HeaderValue::from_static("0"));
    }

    /// Use an encoded body as the response.
    pub fn send(&mut self, encoded: Encoded) {
        self.set_header(CONTENT_TYPE, &encoded.content_type);
        self.body = encoded.body;
    }

    /// Status-only response.
    pub fn status_only(&mut self, status: StatusCode) {
        self.status = status;
        self.headers.remove(CONTENT_TYPE);
        self.body = Bytes::new();
    }

    /// Turn a failure into the response.
    pub fn fail(&mut self, err: &GatewayError) {
        self.status_only(err.status());

        if let GatewayError::Unauthenticated { realm } = err {
            let challenge = format!("Basic realm=\"{}\"", realm.replace('"', ""));
            self.set_header(WWW_AUTHENTICATE, &challenge);
        }

        if let Some(message) = err.explicit_body() {
            let mime = match crate::content::kind::guess(message.as_bytes(), ContentKind::Text) {
                ContentKind::Xml => "application/xml",
                ContentKind::Json => "application/json",
                _ => "text/plain",
            };
            self.set_header(CONTENT_TYPE, mime);
            self.body = Bytes::from(message);
        }
    }
}

impl IntoResponse for Draft {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InvokeError;
    use serde_json::json;

    #[test]
    fn test_unauthenticated_challenge() {
        let mut draft = Draft::new();
        draft.fail(&GatewayError::Unauthenticated { realm: "crm".into() });
        assert_eq!(draft.status, StatusCode::UNAUTHORIZED);
        assert_eq!(draft.headers[WWW_AUTHENTICATE], "Basic realm=\"crm\"");
    }

    #[test]
    fn test_forbidden_has_no_challenge() {
        let mut draft = Draft::new();
        draft.fail(&GatewayError::Unauthorized("no".into()));
        assert_eq!(draft.status, StatusCode::FORBIDDEN);
        assert!(draft.headers.get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_explicit_body_type_is_guessed() {
        let mut draft = Draft::new();
        draft.fail(&GatewayError::OperationExecutionFailed {
            cause: InvokeError::Thrown(json!([422, "{\"field\":\"name\"}"])),
            user_script: true,
        });
        assert_eq!(draft.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(draft.headers[CONTENT_TYPE], "application/json");
        assert_eq!(draft.body, Bytes::from_static(b"{\"field\":\"name\"}"));
    }

    #[test]
    fn test_failure_keeps_other_headers() {
        let mut draft = Draft::new();
        draft.set_header(HeaderName::from_static("access-control-allow-origin"), "*");
        draft.send(Encoded { content_type: "text/plain".into(), body: Bytes::from_static(b"x") });
        draft.fail(&GatewayError::TargetNotFound("f".into()));
        assert_eq!(draft.headers["access-control-allow-origin"], "*");
        assert!(draft.headers.get(CONTENT_TYPE).is_none());
        assert!(draft.body.is_empty());
    }
}
