//! REST gateway binary.
//!
//! Serves the bundled `demo` solution:
//!
//! ```text
//! GET    /rest_ws/demo/notes          list notes
//! GET    /rest_ws/demo/notes/{id}     one note (404 when absent)
//! POST   /rest_ws/demo/notes          create, answers {"id": n}
//! PUT    /rest_ws/demo/notes/{id}     replace
//! DELETE /rest_ws/demo/notes/{id}     remove
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rest_gateway::config::loader::load_config;
use rest_gateway::config::watcher::ConfigWatcher;
use rest_gateway::content::Payload;
use rest_gateway::observability::{logging, metrics};
use rest_gateway::session::{InvokeError, LocalSessionPool, Operation, Solution, SolutionRegistry};
use rest_gateway::{GatewayConfig, HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "rest-gateway", version, about = "Expose pooled solution sessions over REST")]
struct Cli {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("rest-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service = %config.gateway.service_name,
        mount_path = %config.gateway.mount_path,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let registry = SolutionRegistry::new().with(demo_solution());
    let pool = LocalSessionPool::new(registry.into_factory(), config.pool.max_sessions_per_key);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, Arc::new(pool));
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// A small note store shared by every session of the solution.
fn demo_solution() -> Solution {
    let notes: Arc<Mutex<BTreeMap<u64, Value>>> = Arc::default();
    let next_id = Arc::new(Mutex::new(1u64));

    let (list, create, update, delete) = (notes.clone(), notes.clone(), notes.clone(), notes);

    Solution::new("demo")
        .operation("notes", Operation::Read, move |inv| {
            let notes = list.lock().map_err(|_| InvokeError::Engine("note store poisoned".into()))?;
            match inv.args.first() {
                Some(id @ Payload::Value(Value::String(_))) => Ok(note_id(id)
                    .and_then(|id| notes.get(&id).cloned())
                    .map_or_else(Payload::null, Payload::from)),
                _ => Ok(Payload::from(json!(notes.values().collect::<Vec<_>>()))),
            }
        })
        .operation("notes", Operation::Create, move |inv| {
            let body = inv.args.first().map(Payload::to_json).unwrap_or(Value::Null);
            let mut next = next_id.lock().map_err(|_| InvokeError::Engine("id counter poisoned".into()))?;
            let id = *next;
            *next += 1;
            let mut notes = create.lock().map_err(|_| InvokeError::Engine("note store poisoned".into()))?;
            notes.insert(id, json!({"id": id, "note": body}));
            Ok(Payload::from(json!({"id": id})))
        })
        .operation("notes", Operation::Update, move |inv| {
            let body = inv.args.first().map(Payload::to_json).unwrap_or(Value::Null);
            let id = inv.args.get(1).and_then(note_id).ok_or_else(|| InvokeError::Thrown(json!([400, "note id required"])))?;
            let mut notes = update.lock().map_err(|_| InvokeError::Engine("note store poisoned".into()))?;
            match notes.get_mut(&id) {
                Some(note) => {
                    *note = json!({"id": id, "note": body});
                    Ok(Payload::from(note.clone()))
                }
                None => Ok(Payload::null()),
            }
        })
        .operation("notes", Operation::Delete, move |inv| {
            let id = inv.args.first().and_then(note_id).ok_or_else(|| InvokeError::Thrown(json!([400, "note id required"])))?;
            let mut notes = delete.lock().map_err(|_| InvokeError::Engine("note store poisoned".into()))?;
            Ok(Payload::from(json!(notes.remove(&id).is_some())))
        })
}

fn note_id(arg: &Payload) -> Option<u64> {
    match arg {
        Payload::Value(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}
