//! HTTP Basic credential extraction.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

/// A user name and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read `Authorization: Basic <base64(user:password)>`.
    ///
    /// Credentials are decoded as UTF-8 and split at the first `:`. A
    /// missing user, or a blank user or password, yields `None`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let Some(header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            debug!("No Authorization header");
            return None;
        };

        let Some(encoded) = header
            .get(..6)
            .filter(|scheme| scheme.eq_ignore_ascii_case("basic "))
            .map(|_| &header[6..])
        else {
            debug!("Unsupported Authorization scheme");
            return None;
        };

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = match decoded.find(':') {
            Some(i) if i > 0 => (&decoded[..i], &decoded[i + 1..]),
            _ => return None,
        };

        if user.trim().is_empty() || password.trim().is_empty() {
            debug!("Blank credentials");
            return None;
        }

        Some(Self { user: user.to_string(), password: password.to_string() })
    }
}
