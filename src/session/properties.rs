//! Session property bridge.
//!
//! # Responsibilities
//! - Load session properties from the request before dispatch
//! - Write session properties back as a header and cookies after dispatch
//!
//! # Design Decisions
//! - The properties header wins over cookies; the two are never merged
//! - Inbound always replaces the map, so a pooled session never carries
//!   one client's properties into another client's request
//! - Cookie values that are not plain tokens are base64-encoded behind a
//!   marker prefix

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::{error, warn};

use super::{Properties, Session};

/// Header carrying the properties as a flat JSON object.
pub const USER_PROPERTIES_HEADER: &str = "ws.userproperties";

/// Name prefix of per-property cookies.
pub const COOKIE_PREFIX: &str = "ws.userproperty.";

/// Value prefix marking a base64-encoded cookie value.
pub const COOKIE_BASE64_MARKER: &str = "B64p_";

/// Replace the session's properties with what the request carries.
///
/// A malformed properties header is logged and leaves the session's
/// current properties untouched.
pub fn apply_inbound(headers: &HeaderMap, session: &mut dyn Session) {
    if let Some(raw) = headers.get(USER_PROPERTIES_HEADER) {
        match parse_header(raw.as_bytes()) {
            Some(map) => session.set_properties(map),
            None => error!(header = USER_PROPERTIES_HEADER, "Cannot read properties header"),
        }
        return;
    }

    let mut map = Properties::new();
    for (name, value) in request_cookies(headers) {
        if let Some(key) = name.strip_prefix(COOKIE_PREFIX) {
            map.insert(key.to_string(), decode_cookie_value(value));
        }
    }
    session.set_properties(map);
}

/// Write the session's properties to the response.
///
/// Nothing is written for an empty map. Output is deterministic for an
/// unchanged map.
pub fn write_outbound(properties: &Properties, cookie_path: &str, secure: bool, headers: &mut HeaderMap) {
    if properties.is_empty() {
        return;
    }

    match serde_json::to_vec(properties).map(|json| HeaderValue::from_bytes(&json)) {
        Ok(Ok(value)) => {
            headers.insert(USER_PROPERTIES_HEADER, value);
        }
        _ => error!(header = USER_PROPERTIES_HEADER, "Cannot write properties header"),
    }

    for (name, value) in properties {
        if !is_cookie_name(name) {
            warn!(property = %name, "Property name is not a cookie token, not sent as a cookie");
            continue;
        }
        let mut cookie = format!("{COOKIE_PREFIX}{name}={}; Path={cookie_path}", encode_cookie_value(value));
        if secure {
            cookie.push_str("; Secure");
        }
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!(property = %name, "Property cannot be sent as a cookie"),
        }
    }
}

fn parse_header(raw: &[u8]) -> Option<Properties> {
    let Value::Object(object) = serde_json::from_slice::<Value>(raw).ok()? else {
        return None;
    };
    Some(
        object
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect(),
    )
}

/// `name=value` pairs from every `Cookie` header.
fn request_cookies(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.trim(), value))
        })
}

fn decode_cookie_value(value: &str) -> String {
    let Some(encoded) = value.strip_prefix(COOKIE_BASE64_MARKER) else {
        return value.to_string();
    };
    match STANDARD.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "Undecodable cookie value kept as-is");
            value.to_string()
        }
    }
}

fn encode_cookie_value(value: &str) -> String {
    if is_cookie_token(value) && !value.starts_with(COOKIE_BASE64_MARKER) {
        value.to_string()
    } else {
        format!("{COOKIE_BASE64_MARKER}{}", STANDARD.encode(value.as_bytes()))
    }
}

/// RFC 6265 cookie-name: an RFC 2616 token.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?'
                        | b'=' | b'{' | b'}'
                )
        })
}

/// RFC 6265 cookie-octets.
fn is_cookie_token(value: &str) -> bool {
    value.bytes().all(|b| {
        matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
    })
}
