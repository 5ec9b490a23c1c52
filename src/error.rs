//! Gateway error taxonomy.
//!
//! Every failure a request can hit is one of these variants. They are all
//! caught at the dispatcher boundary and turned into a status code (plus an
//! optional body) by [`GatewayError::status`] and
//! [`crate::http::response::Draft::fail`].

use axum::http::StatusCode;
use thiserror::Error;

use crate::session::{InvokeError, PoolError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not parse path '{0}'")]
    InvalidPath(String),

    #[error("unsupported content type")]
    UnsupportedContent,

    #[error("request has no body")]
    NoContent,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request body: {0}")]
    MalformedContent(String),

    #[error("not authenticated (realm {realm})")]
    Unauthenticated { realm: String },

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("solution {0} not loaded")]
    ScopeUnavailable(String),

    #[error("scope {0} not found")]
    TargetNotFound(String),

    #[error("operation {operation} not found on scope {scope}")]
    OperationNotAllowed { scope: String, operation: String },

    #[error("operation execution failed: {cause}")]
    OperationExecutionFailed { cause: InvokeError, user_script: bool },

    #[error("no session available for {key}: {source}")]
    NoSessionAvailable {
        key: String,
        #[source]
        source: PoolError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnsupportedContent => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::NoContent => StatusCode::NO_CONTENT,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::MalformedContent(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Unauthorized(_) => StatusCode::FORBIDDEN,
            GatewayError::ScopeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::TargetNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::OperationNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::OperationExecutionFailed { cause, .. } => cause
                .explicit_status()
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            GatewayError::NoSessionAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-supplied body, only present for `[status, message]` throws.
    pub fn explicit_body(&self) -> Option<String> {
        match self {
            GatewayError::OperationExecutionFailed { cause, .. } => cause.explicit_message(),
            _ => None,
        }
    }

    /// Whether the pooled session must be reloaded after this failure.
    ///
    /// Only failures outside the invoked business logic qualify.
    pub fn forces_reload(&self) -> bool {
        match self {
            GatewayError::OperationExecutionFailed { user_script, .. } => !user_script,
            GatewayError::Internal(_) => true,
            _ => false,
        }
    }

    /// Whether the failure is unclassified and should be reported to the session.
    pub fn is_unclassified(&self) -> bool {
        match self {
            GatewayError::OperationExecutionFailed { cause, .. } => cause.explicit_status().is_none(),
            GatewayError::Internal(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping() {
        assert_eq!(GatewayError::InvalidPath("/x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::NoContent.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            GatewayError::Unauthenticated { realm: "demo".into() }.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::Unauthorized("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(GatewayError::ScopeUnavailable("s".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(GatewayError::TargetNotFound("f".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::OperationNotAllowed { scope: "f".into(), operation: "read".into() }.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn thrown_status_pair_carries_body() {
        let err = GatewayError::OperationExecutionFailed {
            cause: InvokeError::Thrown(json!([409, "conflict"])),
            user_script: true,
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.explicit_body().as_deref(), Some("conflict"));
        assert!(!err.forces_reload());
        assert!(!err.is_unclassified());
    }

    #[test]
    fn engine_failure_forces_reload() {
        let err = GatewayError::OperationExecutionFailed {
            cause: InvokeError::Engine("boom".into()),
            user_script: false,
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.forces_reload());
        assert!(err.is_unclassified());
    }
}
