//! Request path parsing.
//!
//! # Responsibilities
//! - Split `/{service}/{session-key}/{scope}/{arg}*` into a [`RequestPath`]
//! - Reject paths that do not carry the configured service marker
//!
//! # Design Decisions
//! - Trailing empty segments are dropped (`/svc/sol/form/` has no args)
//! - Empty segments in the middle are kept as empty positional args
//! - The mount prefix (context + servlet path) is stripped before parsing

use crate::error::GatewayError;

/// A parsed gateway request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    /// Key of the pooled session (the solution name).
    pub session_key: String,
    /// Named unit of business logic the operation runs on.
    pub operation_scope: String,
    /// Remaining segments, in order.
    pub positional_args: Vec<String>,
}

/// Parse a raw path against the service marker.
///
/// Segment 0 is the empty string before the leading slash, segment 1 must
/// equal `service_marker`, segment 2 is the session key and segment 3 the
/// operation scope.
pub fn parse_path(raw_path: &str, service_marker: &str) -> Result<RequestPath, GatewayError> {
    let mut segments: Vec<&str> = raw_path.split('/').collect();
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    if segments.len() < 4 || segments[1] != service_marker {
        return Err(GatewayError::InvalidPath(raw_path.to_string()));
    }

    Ok(RequestPath {
        session_key: segments[2].to_string(),
        operation_scope: segments[3].to_string(),
        positional_args: segments[4..].iter().map(|s| s.to_string()).collect(),
    })
}

/// Remove the mount prefix from a request path.
///
/// Returns `None` when the path lives outside the mount point.
pub fn strip_mount<'a>(path: &'a str, mount_path: &str) -> Option<&'a str> {
    if mount_path.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount_path)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let path = parse_path("/rest_ws/mysol/myform/a1/a2", "rest_ws").unwrap();
        assert_eq!(path.session_key, "mysol");
        assert_eq!(path.operation_scope, "myform");
        assert_eq!(path.positional_args, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn test_parse_without_args() {
        let path = parse_path("/rest_ws/mysol/myform", "rest_ws").unwrap();
        assert!(path.positional_args.is_empty());

        // trailing slash does not produce an empty argument
        let path = parse_path("/rest_ws/mysol/myform/", "rest_ws").unwrap();
        assert!(path.positional_args.is_empty());
    }

    #[test]
    fn test_inner_empty_segment_is_kept() {
        let path = parse_path("/rest_ws/mysol/myform//x", "rest_ws").unwrap();
        assert_eq!(path.positional_args, vec!["".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_too_few_segments() {
        for raw in ["", "/", "/rest_ws", "/rest_ws/mysol", "/rest_ws/mysol/"] {
            assert!(
                matches!(parse_path(raw, "rest_ws"), Err(GatewayError::InvalidPath(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_wrong_marker() {
        assert!(matches!(
            parse_path("/other/mysol/myform", "rest_ws"),
            Err(GatewayError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_strip_mount() {
        assert_eq!(strip_mount("/rest_ws/a/b", ""), Some("/rest_ws/a/b"));
        assert_eq!(strip_mount("/api/rest_ws/a/b", "/api"), Some("/rest_ws/a/b"));
        assert_eq!(strip_mount("/apix/rest_ws", "/api"), None);
        assert_eq!(strip_mount("/other", "/api"), None);
    }
}
