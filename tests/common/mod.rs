//! Shared utilities for integration testing.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rest_gateway::content::Payload;
use rest_gateway::lifecycle::Shutdown;
use rest_gateway::session::{InvokeError, LocalSessionPool, Operation, Solution, SolutionRegistry};
use rest_gateway::{GatewayConfig, HttpServer};

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    /// `http://127.0.0.1:{port}/rest_ws`
    pub base: String,
    pub shutdown: Shutdown,
    pub pool: Arc<LocalSessionPool>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gateway serving `registry` with `config`.
pub async fn spawn_gateway(config: GatewayConfig, registry: SolutionRegistry) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{}{}/{}", addr, config.gateway.mount_path, config.gateway.service_name);

    let pool = Arc::new(LocalSessionPool::new(registry.into_factory(), config.pool.max_sessions_per_key));
    let shutdown = Shutdown::new();
    let (_updates_tx, updates_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config, pool.clone());
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, updates_rx, stop).await.unwrap();
    });

    TestGateway { base, shutdown, pool }
}

fn string_arg(args: &[Payload], index: usize) -> Option<String> {
    match args.get(index) {
        Some(Payload::Value(Value::String(s))) => Some(s.clone()),
        _ => None,
    }
}

fn all_args(args: &[Payload]) -> Payload {
    Payload::from(Value::Array(args.iter().map(Payload::to_json).collect()))
}

/// The `crm` solution used across the integration tests.
///
/// - `orders`: read (null without an id, throws on `conflict`/`gone`,
///   fails on `boom`, panics on `panic`),
///   create (`{"id":7}`), update and delete echo their arguments
/// - `archive`: read and delete only
/// - `echo`: every body verb answers with its argument list
/// - `prefs`: read counts visits in a session property
/// - `files`: response headers plus a PNG byte result
/// - `report`: read presets a CSV content type
/// - `vault`: authentication hook; read echoes its arguments
pub fn crm_solution() -> Solution {
    Solution::new("crm")
        .operation("orders", Operation::Read, |inv| match string_arg(&inv.args, 0).as_deref() {
            None => Ok(Payload::null()),
            Some("conflict") => Err(InvokeError::Thrown(json!([409, "order is locked"]))),
            Some("gone") => Err(InvokeError::Thrown(json!(410))),
            Some("boom") => Err(InvokeError::Engine("engine crashed".into())),
            Some("panic") => panic!("order engine panicked"),
            Some("none") => Ok(Payload::from(json!(false))),
            Some(id) => Ok(Payload::from(json!({"id": id, "status": "open"}))),
        })
        .operation("orders", Operation::Create, |_| Ok(Payload::from(json!({"id": 7}))))
        .operation("orders", Operation::Update, |inv| Ok(all_args(&inv.args)))
        .operation("orders", Operation::Delete, |inv| Ok(all_args(&inv.args)))
        .operation("archive", Operation::Read, |_| Ok(Payload::from(json!([]))))
        .operation("archive", Operation::Delete, |_| Ok(Payload::from(json!(true))))
        .operation("echo", Operation::Create, |inv| Ok(all_args(&inv.args)))
        .operation("echo", Operation::Update, |inv| Ok(all_args(&inv.args)))
        .operation("echo", Operation::Patch, |inv| Ok(all_args(&inv.args)))
        .operation("prefs", Operation::Read, |inv| {
            let visits = inv
                .properties
                .get("visits")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0)
                + 1;
            inv.properties.insert("visits".into(), visits.to_string());
            Ok(Payload::from(json!({"visits": visits})))
        })
        .operation("files", Operation::ResponseHeaders, |_| {
            Ok(Payload::from(json!([
                "Content-Disposition=attachment;filename=\"logo.png\"",
                {"name": "X-File-Count", "value": 1},
                42
            ])))
        })
        .operation("files", Operation::Read, |_| {
            Ok(Payload::from(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()))
        })
        .operation("report", Operation::Read, |inv| {
            inv.exchange.content_type = Some("text/csv".into());
            Ok(Payload::from("id,total\n7,12.50\n"))
        })
        .operation("vault", Operation::Authenticate, |inv| {
            match (string_arg(&inv.args, 0).as_deref(), string_arg(&inv.args, 1).as_deref()) {
                (Some("alice"), Some("wonder")) => Ok(Payload::from(json!({"uid": 9}))),
                (Some("bob"), Some("builder")) => Ok(Payload::from(json!(true))),
                _ => Ok(Payload::from(json!(false))),
            }
        })
        .operation("vault", Operation::Read, |inv| Ok(all_args(&inv.args)))
}

pub fn registry() -> SolutionRegistry {
    SolutionRegistry::new()
        .with(crm_solution())
        .with(Solution::new("broken").scope("orders").unloaded())
}
