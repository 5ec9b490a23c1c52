//! The per-request authentication decision.

use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{debug, info};

use super::basic::Credentials;
use super::directory::{Directory, StaticDirectory};
use crate::config::AuthConfig;
use crate::content::Payload;
use crate::error::GatewayError;
use crate::session::{Exchange, Existence, Operation, Session};

/// Outcome of the authentication chain.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// Proceed. A hook may hand back a value for the operation.
    Allowed(Option<Payload>),
    /// Who are you? Answered with a challenge for `realm`.
    Unauthenticated { realm: String },
    /// Known, but not permitted.
    Unauthorized(String),
}

impl AuthOutcome {
    /// The extra argument on success, or the matching gateway error.
    pub fn into_result(self) -> Result<Option<Payload>, GatewayError> {
        match self {
            AuthOutcome::Allowed(extra) => Ok(extra),
            AuthOutcome::Unauthenticated { realm } => Err(GatewayError::Unauthenticated { realm }),
            AuthOutcome::Unauthorized(reason) => Err(GatewayError::Unauthorized(reason)),
        }
    }
}

/// Authorization settings, swapped as a whole on config reload.
#[derive(Clone)]
pub struct AuthSettings {
    /// `None` disables the group check entirely.
    pub authorized_groups: Option<Vec<String>>,
    pub directory: Arc<dyn Directory>,
}

impl AuthSettings {
    pub fn from_config(config: &AuthConfig, directory: Option<Arc<dyn Directory>>) -> Self {
        let directory =
            directory.unwrap_or_else(|| Arc::new(StaticDirectory::from_users(&config.users)));
        Self { authorized_groups: config.authorized_groups.clone(), directory }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("authorized_groups", &self.authorized_groups)
            .finish_non_exhaustive()
    }
}

/// Decide whether the request may run an operation on `scope`.
pub fn authenticate(
    settings: &AuthSettings,
    session: &mut dyn Session,
    headers: &HeaderMap,
    realm: &str,
    scope: &str,
    exchange: &mut Exchange,
) -> AuthOutcome {
    if session.operation_exists(scope, Operation::Authenticate) == Existence::Found {
        return run_hook(session, headers, realm, scope, exchange);
    }

    let Some(groups) = settings.authorized_groups.as_ref() else {
        debug!("No authorization to check, allow all access");
        return AuthOutcome::Allowed(None);
    };

    let Some(creds) = Credentials::from_headers(headers) else {
        debug!("No credentials to proceed with authentication");
        return AuthOutcome::Unauthenticated { realm: realm.to_string() };
    };

    let Some(uid) = settings.directory.check_password(&creds.user, &creds.password) else {
        debug!(user = %creds.user, "Supplied credentials not valid");
        return AuthOutcome::Unauthenticated { realm: realm.to_string() };
    };

    let user_groups = settings.directory.user_groups(&uid);
    let matched = user_groups
        .iter()
        .find(|ug| groups.iter().any(|ag| ag.trim() == ug.as_str()));
    match matched {
        Some(group) => {
            debug!(user = %creds.user, group = %group, "Authorized access");
            AuthOutcome::Allowed(None)
        }
        None => {
            info!(user = %creds.user, "User not in any authorized group");
            AuthOutcome::Unauthorized("User not authorized".to_string())
        }
    }
}

fn run_hook(
    session: &mut dyn Session,
    headers: &HeaderMap,
    realm: &str,
    scope: &str,
    exchange: &mut Exchange,
) -> AuthOutcome {
    let Some(creds) = Credentials::from_headers(headers) else {
        debug!("No credentials to proceed with authentication");
        return AuthOutcome::Unauthenticated { realm: realm.to_string() };
    };

    let args = vec![Payload::from(creds.user.clone()), Payload::from(creds.password)];
    match session.invoke(scope, Operation::Authenticate, args, exchange) {
        Ok(result) if !result.is_falsy() => {
            if matches!(result, Payload::Value(serde_json::Value::Bool(true))) {
                AuthOutcome::Allowed(None)
            } else {
                AuthOutcome::Allowed(Some(result))
            }
        }
        Ok(_) => {
            info!(user = %creds.user, "Authentication hook denied authentication");
            AuthOutcome::Unauthenticated { realm: realm.to_string() }
        }
        Err(e) => {
            info!(user = %creds.user, error = %e, "Authentication hook failed");
            AuthOutcome::Unauthenticated { realm: realm.to_string() }
        }
    }
}
