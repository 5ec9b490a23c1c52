//! Pooled execution sessions.
//!
//! # Responsibilities
//! - Define the capability interface the dispatcher drives ([`Session`])
//! - Define the keyed checkout/checkin contract ([`SessionPool`])
//! - Provide an in-process pool and a closure-backed session
//! - Bridge session properties to headers and cookies
//!
//! # Data Flow
//! ```text
//! dispatcher ── acquire(key) ──→ SessionPool ──→ PooledSession (guard)
//!     │                                               │
//!     ├─ operation_exists / invoke ───────────────────┤
//!     ├─ properties / set_properties ─────────────────┤
//!     └─ drop(guard) ── release(key, session, reload) ┘
//! ```
//!
//! # Design Decisions
//! - Sessions are synchronous; callers run them on blocking threads
//! - A session is checked out by exactly one request at a time; the pool
//!   enforces this, the dispatcher only holds the guard
//! - Release happens in `Drop`, so early returns and panics still check in

pub mod guard;
pub mod pool;
pub mod properties;
pub mod scripted;

use std::collections::BTreeMap;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::content::Payload;

pub use guard::PooledSession;
pub use pool::{LocalSessionPool, SessionFactory};
pub use scripted::{Invocation, ScriptedSession, Solution, SolutionRegistry};

/// Key suffix selecting the variant of a solution without debugger hooks.
pub const NODEBUG_SUFFIX: &str = ":nodebug";

/// Session-scoped user properties.
pub type Properties = BTreeMap<String, String>;

/// Operations a scope can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Patch,
    Delete,
    Authenticate,
    ResponseHeaders,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
            Operation::Authenticate => "authenticate",
            Operation::ResponseHeaders => "response_headers",
        }
    }

    /// Conventional name of the script function implementing the operation.
    pub fn function_name(self) -> String {
        format!("ws_{}", self.as_str())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of looking up an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// The session has no solution loaded.
    NoSolution,
    /// The solution has no such scope.
    ScopeNotFound,
    /// The scope does not implement the operation.
    NotFound,
    Found,
}

/// A non-negative integer, including integral floats such as `404.0`.
fn status_number(value: &Value) -> Option<u64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u16::MAX))
            .map(|f| f as u64)
    })
}

/// Failure of an invoked operation.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// A value thrown by business logic.
    #[error("operation threw {0}")]
    Thrown(Value),

    /// The execution engine itself failed.
    #[error("engine failure: {0}")]
    Engine(String),
}

impl InvokeError {
    /// Raised on purpose by the invoked business logic.
    pub fn is_user_script(&self) -> bool {
        matches!(self, InvokeError::Thrown(_))
    }

    /// `throw 404` or `throw [404, "message"]`.
    pub fn explicit_status(&self) -> Option<StatusCode> {
        let InvokeError::Thrown(value) = self else {
            return None;
        };
        let code = match value {
            Value::Array(items) => items.first().and_then(status_number),
            other => status_number(other),
        }?;
        StatusCode::from_u16(u16::try_from(code).ok()?).ok()
    }

    /// Message of a `[status, message]` throw.
    pub fn explicit_message(&self) -> Option<String> {
        self.explicit_status()?;
        match self {
            InvokeError::Thrown(Value::Array(items)) if items.len() > 1 => match &items[1] {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no sessions available")]
    Exhausted,

    #[error("unknown solution '{0}'")]
    UnknownSolution(String),

    #[error("session creation failed: {0}")]
    Creation(String),
}

impl PoolError {
    /// Fixed label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PoolError::Exhausted => "exhausted",
            PoolError::UnknownSolution(_) => "unknown",
            PoolError::Creation(_) => "creation",
        }
    }
}

/// Per-invocation view of the inbound request, plus the response overrides
/// an operation may set.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Content type the operation wants the response sent with.
    pub content_type: Option<String>,
    /// Charset the operation wants the response written in.
    pub charset: Option<String>,
}

impl Exchange {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self { method, uri, headers, content_type: None, charset: None }
    }
}

/// Capability interface of a checked-out execution context.
pub trait Session: Send {
    /// Name of the loaded solution.
    fn solution_name(&self) -> &str;

    fn operation_exists(&self, scope: &str, operation: Operation) -> Existence;

    fn invoke(
        &mut self,
        scope: &str,
        operation: Operation,
        args: Vec<Payload>,
        exchange: &mut Exchange,
    ) -> Result<Payload, InvokeError>;

    fn properties(&self) -> &Properties;

    fn set_properties(&mut self, properties: Properties);

    /// Surface an unexpected failure to whoever operates the solution.
    fn report_error(&self, context: &str, message: &str) {
        error!(solution = %self.solution_name(), context = %context, "{}", message);
    }
}

/// Keyed pool of sessions.
///
/// At most one request holds a given session; acquire and release are
/// atomic per key.
pub trait SessionPool: Send + Sync {
    fn acquire(&self, key: &str) -> Result<Box<dyn Session>, PoolError>;

    /// Check a session back in. With `reload` the session is discarded.
    fn release(&self, key: &str, session: Box<dyn Session>, reload: bool);
}
