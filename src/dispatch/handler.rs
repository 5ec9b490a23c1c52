//! The gateway request handler.
//!
//! # Data Flow
//! ```text
//! request ─→ CORS ─→ read + decode body ─→ parse path
//!                                              │
//!             spawn_blocking ←─────────────────┘
//!                  │
//!   acquire ─→ properties in ─→ auth ─→ verify ─→ invoke ─→ properties out ─→ encode
//!      └──────────────────────── release (guard drop) ────────────────────────┘
//! ```
//!
//! Everything after the session checkout runs synchronously on a blocking
//! thread: sessions are single-threaded execution contexts.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{self, Body};
use axum::extract::{Path, State};
use axum::http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_REQUEST_HEADERS,
    ALLOW, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::args::{build_args, query_param};
use super::cors::{apply_cors, nodebug_requested, NODEBUG_HEADER};
use crate::auth::{authenticate, AuthSettings};
use crate::config::GatewayConfig;
use crate::content::encode::{encode, encode_binary, encode_preset};
use crate::content::{classify, decode, header_param, ContentKind, Payload, CHARSET_DEFAULT};
use crate::error::GatewayError;
use crate::http::request::{is_secure, request_id};
use crate::http::response::Draft;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{parse_path, strip_mount, RequestPath};
use crate::session::properties::{apply_inbound, write_outbound, USER_PROPERTIES_HEADER};
use crate::session::{Exchange, Existence, Operation, PooledSession, Session, SessionPool, NODEBUG_SUFFIX};

/// Methods the gateway dispatches. HEAD is served as GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Verb {
    fn from_method(method: &Method) -> Option<Self> {
        match method.as_str() {
            "GET" | "HEAD" => Some(Verb::Get),
            "POST" => Some(Verb::Post),
            "PUT" => Some(Verb::Put),
            "PATCH" => Some(Verb::Patch),
            "DELETE" => Some(Verb::Delete),
            "OPTIONS" => Some(Verb::Options),
            _ => None,
        }
    }

    fn operation(self) -> Option<Operation> {
        match self {
            Verb::Get => Some(Operation::Read),
            Verb::Post => Some(Operation::Create),
            Verb::Put => Some(Operation::Update),
            Verb::Patch => Some(Operation::Patch),
            Verb::Delete => Some(Operation::Delete),
            Verb::Options => None,
        }
    }

    fn has_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }
}

/// A request that passed the async checks and is ready for a session.
struct Call {
    verb: Verb,
    key: String,
    path: RequestPath,
    body: Option<(Payload, ContentKind)>,
    exchange: Exchange,
    secure: bool,
    request_id: String,
    config: Arc<GatewayConfig>,
    auth: Arc<AuthSettings>,
}

/// Handler for `/`.
pub async fn dispatch_root(State(state): State<AppState>, request: Request<Body>) -> Response {
    dispatch(state, "/".to_string(), request).await
}

/// Handler for every other path. The path arrives percent-decoded.
pub async fn dispatch_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request<Body>,
) -> Response {
    dispatch(state, format!("/{path}"), request).await
}

async fn dispatch(state: AppState, path: String, request: Request<Body>) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers).to_string();
    let nodebug = nodebug_requested(&parts.method, &parts.headers);

    let mut draft = Draft::new();
    apply_cors(&mut draft, &parts.headers, nodebug);

    debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %path,
        nodebug,
        "Dispatching request"
    );

    let draft = match Verb::from_method(&parts.method) {
        None => {
            debug!(request_id = %request_id, method = %parts.method, "Method not supported");
            draft.status_only(StatusCode::METHOD_NOT_ALLOWED);
            draft
        }
        Some(verb) => match prepare(&state, verb, &path, nodebug, &parts, body, &request_id).await {
            Ok(call) => execute(&state, call, draft).await,
            Err(err) => {
                log_failure(&request_id, &err);
                draft.fail(&err);
                draft
            }
        },
    };

    metrics::record_request(parts.method.as_str(), draft.status.as_u16(), started.elapsed());
    draft.into_response()
}

async fn prepare(
    state: &AppState,
    verb: Verb,
    raw_path: &str,
    nodebug: bool,
    parts: &Parts,
    body: Body,
    request_id: &str,
) -> Result<Call, GatewayError> {
    let config = state.inner.config.load_full();

    let body = if verb.has_body() {
        Some(read_body(&parts.headers, body, config.security.max_body_size).await?)
    } else {
        None
    };

    let stripped = strip_mount(raw_path, &config.gateway.mount_path)
        .ok_or_else(|| GatewayError::InvalidPath(raw_path.to_string()))?;
    let path = parse_path(stripped, &config.gateway.service_name)?;

    let key = if nodebug {
        format!("{}{NODEBUG_SUFFIX}", path.session_key)
    } else {
        path.session_key.clone()
    };

    Ok(Call {
        verb,
        key,
        path,
        body,
        exchange: Exchange::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone()),
        secure: is_secure(&parts.headers, state.inner.tls_enabled),
        request_id: request_id.to_string(),
        config,
        auth: state.inner.auth.load_full(),
    })
}

/// Buffer, classify and decode a request body.
async fn read_body(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<(Payload, ContentKind), GatewayError> {
    let declared = header_str(headers, CONTENT_LENGTH).and_then(|v| v.trim().parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let bytes = body::to_bytes(body, limit).await.map_err(|e| {
        debug!(error = %e, "Failed to buffer request body");
        GatewayError::PayloadTooLarge { limit }
    })?;
    if bytes.is_empty() {
        return Err(GatewayError::NoContent);
    }

    let content_type = header_str(headers, CONTENT_TYPE);
    let kind = classify(content_type, Some(&bytes[..]), ContentKind::Other);
    if kind == ContentKind::Other {
        return Err(GatewayError::UnsupportedContent);
    }

    let charset = content_type
        .and_then(|ct| header_param(ct, "charset"))
        .unwrap_or_else(|| CHARSET_DEFAULT.to_string());
    let payload = decode(kind, content_type, bytes, &charset).await?;
    Ok((payload, kind))
}

async fn execute(state: &AppState, call: Call, draft: Draft) -> Draft {
    let pool = state.inner.pool.clone();
    let request_id = call.request_id.clone();
    let fallback = draft.clone();

    match tokio::task::spawn_blocking(move || run_bracket(pool, call, draft)).await {
        Ok(draft) => draft,
        Err(e) => {
            let err = GatewayError::Internal(e.to_string());
            log_failure(&request_id, &err);
            let mut draft = fallback;
            draft.fail(&err);
            draft
        }
    }
}

/// Check out a session, run the call on it, check it back in.
fn run_bracket(pool: Arc<dyn SessionPool>, mut call: Call, mut draft: Draft) -> Draft {
    let mut session = match PooledSession::acquire(pool, &call.key) {
        Ok(session) => session,
        Err(source) => {
            metrics::record_session_acquire_failure(source.reason());
            let err = GatewayError::NoSessionAvailable { key: call.key.clone(), source };
            log_failure(&call.request_id, &err);
            draft.fail(&err);
            return draft;
        }
    };

    if call.config.gateway.reload_after_request {
        session.request_reload();
    }

    let outcome = match call.verb {
        Verb::Options => options(&mut call, &mut *session, &mut draft),
        _ => service(&mut call, &mut *session, &mut draft),
    };

    if let Err(err) = outcome {
        if err.forces_reload() {
            session.request_reload();
        }
        if err.is_unclassified() {
            session.report_error("Error executing rest call", &err.to_string());
        }
        log_failure(&call.request_id, &err);
        draft.fail(&err);
    }
    draft
}

fn service(call: &mut Call, session: &mut dyn Session, draft: &mut Draft) -> Result<(), GatewayError> {
    let Some(operation) = call.verb.operation() else {
        return Ok(());
    };
    let scope = call.path.operation_scope.clone();

    apply_inbound(&call.exchange.headers, session);

    let headers = call.exchange.headers.clone();
    let auth_extra = authenticate(
        &call.auth,
        session,
        &headers,
        &call.path.session_key,
        &scope,
        &mut call.exchange,
    )
    .into_result()?;

    verify(session, &scope, operation)?;
    apply_response_headers(session, &scope, &mut call.exchange, draft);

    let body_kind = call.body.as_ref().map(|(_, kind)| *kind);
    let body = call.body.take().map(|(payload, _)| payload);
    let args = build_args(body, &call.path.positional_args, call.exchange.uri.query(), auth_extra);

    debug!(request_id = %call.request_id, scope = %scope, operation = %operation, args = args.len(), "Invoking operation");
    let result = session
        .invoke(&scope, operation, args, &mut call.exchange)
        .map_err(|cause| {
            info!(request_id = %call.request_id, scope = %scope, operation = %operation, error = %cause, "Operation execution failed");
            GatewayError::OperationExecutionFailed { user_script: cause.is_user_script(), cause }
        })?;

    write_outbound(session.properties(), &cookie_path(&call.config, session), call.secure, &mut draft.headers);

    match operation {
        Operation::Create if result.is_null() => draft.no_cache(),
        Operation::Create => {
            draft.no_cache();
            send_result(call, body_kind, &result, draft)?;
        }
        _ if result.is_null() || result.is_false() => draft.status_only(StatusCode::NOT_FOUND),
        _ => {
            draft.no_cache();
            send_result(call, body_kind, &result, draft)?;
        }
    }
    Ok(())
}

fn options(call: &mut Call, session: &mut dyn Session, draft: &mut Draft) -> Result<(), GatewayError> {
    let scope = &call.path.operation_scope;
    apply_inbound(&call.exchange.headers, session);

    let mut allow = String::from("TRACE, OPTIONS, HEAD");
    for (operation, verb) in [
        (Operation::Read, "GET"),
        (Operation::Create, "POST"),
        (Operation::Update, "PUT"),
        (Operation::Patch, "PATCH"),
        (Operation::Delete, "DELETE"),
    ] {
        if session.operation_exists(scope, operation) == Existence::Found {
            allow.push_str(", ");
            allow.push_str(verb);
        }
    }
    draft.set_header(ALLOW, &allow);

    let allowed_headers = match header_str(&call.exchange.headers, ACCESS_CONTROL_REQUEST_HEADERS) {
        None => "Allow".to_string(),
        Some(requested) if requested.contains("Allow") => requested.to_string(),
        Some(requested) => format!("{requested}, Allow"),
    };
    draft.set_header(ACCESS_CONTROL_ALLOW_HEADERS, &allowed_headers);
    draft.set_header(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        &format!("{allowed_headers}, {NODEBUG_HEADER}, {USER_PROPERTIES_HEADER}"),
    );

    write_outbound(session.properties(), &cookie_path(&call.config, session), call.secure, &mut draft.headers);
    Ok(())
}

fn verify(session: &dyn Session, scope: &str, operation: Operation) -> Result<(), GatewayError> {
    match session.operation_exists(scope, operation) {
        Existence::Found => Ok(()),
        Existence::NoSolution => Err(GatewayError::ScopeUnavailable(session.solution_name().to_string())),
        Existence::ScopeNotFound => Err(GatewayError::TargetNotFound(scope.to_string())),
        Existence::NotFound => Err(GatewayError::OperationNotAllowed {
            scope: scope.to_string(),
            operation: operation.function_name(),
        }),
    }
}

/// Run the scope's response-headers operation, if it has one.
fn apply_response_headers(session: &mut dyn Session, scope: &str, exchange: &mut Exchange, draft: &mut Draft) {
    if session.operation_exists(scope, Operation::ResponseHeaders) != Existence::Found {
        return;
    }
    let result = match session.invoke(scope, Operation::ResponseHeaders, Vec::new(), exchange) {
        Ok(result) => result.to_json(),
        Err(e) => {
            warn!(scope = %scope, error = %e, "Response headers operation failed");
            return;
        }
    };

    let items = match result {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    for item in &items {
        match header_pair(item).and_then(|(name, value)| Some((HeaderName::from_bytes(name.as_bytes()).ok()?, value))) {
            Some((name, value)) => draft.append_header(name, &value),
            None => error!(
                scope = %scope,
                item = %item,
                "Cannot send back header; expected a 'name=value' string or an object with 'name' and 'value'"
            ),
        }
    }
}

fn header_pair(item: &Value) -> Option<(String, String)> {
    match item {
        Value::String(s) => {
            let (name, value) = s.split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        }
        Value::Object(map) => {
            let name = map.get("name")?;
            let value = map.get("value")?;
            Some((plain_string(name), plain_string(value)))
        }
        _ => None,
    }
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encode an operation result into the response.
fn send_result(
    call: &Call,
    body_kind: Option<ContentKind>,
    result: &Payload,
    draft: &mut Draft,
) -> Result<(), GatewayError> {
    let headers = &call.exchange.headers;
    let accept = header_str(headers, ACCEPT);

    let charset = call
        .exchange
        .charset
        .clone()
        .or_else(|| accept.and_then(|a| header_param(a, "charset")))
        .or_else(|| header_str(headers, CONTENT_TYPE).and_then(|ct| header_param(ct, "charset")))
        .unwrap_or_else(|| call.config.gateway.default_charset.clone());

    if let Some(preset) = call.exchange.content_type.as_deref() {
        draft.send(encode_preset(result, preset, &charset));
        return Ok(());
    }

    if let Payload::Bytes(bytes) = result {
        draft.send(encode_binary(bytes.clone(), accept));
        return Ok(());
    }

    let verb_default = match call.verb {
        Verb::Post | Verb::Put | Verb::Patch => body_kind.unwrap_or(ContentKind::Json),
        _ => ContentKind::Json,
    };
    let kind = ContentKind::from_header(accept).or(verb_default);
    if kind == ContentKind::Binary {
        error!(request_id = %call.request_id, "Binary response requested but the result is not raw bytes");
    }

    let callback = query_param(call.exchange.uri.query(), "callback");
    draft.send(encode(result, kind, &charset, callback.as_deref())?);
    Ok(())
}

fn cookie_path(config: &GatewayConfig, session: &dyn Session) -> String {
    format!(
        "{}/{}/{}",
        config.gateway.mount_path,
        config.gateway.service_name,
        session.solution_name()
    )
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn log_failure(request_id: &str, err: &GatewayError) {
    let status = err.status();
    if status.is_server_error() {
        error!(request_id = %request_id, status = status.as_u16(), error = %err, "Request failed");
    } else {
        info!(request_id = %request_id, status = status.as_u16(), error = %err, "Request rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_mapping() {
        assert_eq!(Verb::from_method(&Method::HEAD), Some(Verb::Get));
        assert_eq!(Verb::from_method(&Method::PATCH), Some(Verb::Patch));
        assert_eq!(Verb::from_method(&Method::TRACE), None);
        assert_eq!(Verb::Delete.operation(), Some(Operation::Delete));
        assert_eq!(Verb::Options.operation(), None);
        assert!(Verb::Patch.has_body());
        assert!(!Verb::Get.has_body());
    }

    #[test]
    fn test_header_pairs() {
        assert_eq!(
            header_pair(&json!("Content-Disposition=attachment;filename=\"a=b.txt\"")),
            Some(("Content-Disposition".into(), "attachment;filename=\"a=b.txt\"".into()))
        );
        assert_eq!(
            header_pair(&json!({"name": "X-Count", "value": 3})),
            Some(("X-Count".into(), "3".into()))
        );
        assert_eq!(header_pair(&json!("=nope")), None);
        assert_eq!(header_pair(&json!("no-separator")), None);
        assert_eq!(header_pair(&json!({"name": "X-Only"})), None);
        assert_eq!(header_pair(&json!(12)), None);
    }
}
