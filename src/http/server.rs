//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the dispatch handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve plain HTTP or TLS on a bound listener
//! - Apply reloaded configurations to the running gateway
//! - Drain in-flight requests on shutdown

use std::io;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthSettings, Directory};
use crate::config::GatewayConfig;
use crate::dispatch::{dispatch_path, dispatch_root};
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::shutdown::wait;
use crate::net::load_tls_config;
use crate::session::SessionPool;

/// Shared gateway state. Configuration and authorization are swapped
/// atomically on reload; requests in flight keep the snapshot they loaded.
pub struct GatewayState {
    pub config: ArcSwap<GatewayConfig>,
    pub auth: ArcSwap<AuthSettings>,
    pub pool: Arc<dyn SessionPool>,
    /// Fixed at startup; the listener is not rebuilt on reload.
    pub tls_enabled: bool,
    directory: Option<Arc<dyn Directory>>,
}

impl GatewayState {
    /// Swap in a reloaded configuration.
    pub fn apply(&self, config: GatewayConfig) {
        let current = self.config.load();
        if current.listener.bind_address != config.listener.bind_address
            || current.listener.tls.is_some() != config.listener.tls.is_some()
            || current.timeouts.request_secs != config.timeouts.request_secs
        {
            tracing::warn!("Listener and timeout changes take effect after a restart");
        }

        self.auth.store(Arc::new(AuthSettings::from_config(&config.auth, self.directory.clone())));
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<GatewayState>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a server over `pool`, authenticating against the users in
    /// the configuration.
    pub fn new(config: GatewayConfig, pool: Arc<dyn SessionPool>) -> Self {
        Self::build(config, pool, None)
    }

    /// Authenticate against an external directory instead of the
    /// configured users.
    pub fn with_directory(self, directory: Arc<dyn Directory>) -> Self {
        let config = GatewayConfig::clone(&self.state.inner.config.load());
        Self::build(config, self.state.inner.pool.clone(), Some(directory))
    }

    fn build(config: GatewayConfig, pool: Arc<dyn SessionPool>, directory: Option<Arc<dyn Directory>>) -> Self {
        let auth = AuthSettings::from_config(&config.auth, directory.clone());
        let state = GatewayState {
            tls_enabled: config.listener.tls.is_some(),
            config: ArcSwap::from_pointee(config),
            auth: ArcSwap::from_pointee(auth),
            pool,
            directory,
        };
        Self { state: AppState { inner: Arc::new(state) } }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let request_secs = self.state.inner.config.load().timeouts.request_secs;
        Router::new()
            .route("/", any(dispatch_root))
            .route("/{*path}", any(dispatch_path))
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configurations arriving on `config_updates` are applied as they
    /// come in.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.inner.config.load_full();
        let app = self.router();

        let state = self.state.clone();
        let reloads = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.inner.apply(config);
            }
        });

        match &config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await.map_err(io::Error::other)?;
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                let grace = Duration::from_secs(config.timeouts.request_secs);
                tokio::spawn(async move {
                    wait(shutdown).await;
                    drain.graceful_shutdown(Some(grace));
                });

                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app).with_graceful_shutdown(wait(shutdown)).await?;
            }
        }

        reloads.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserConfig;
    use crate::session::{LocalSessionPool, SolutionRegistry};

    fn server() -> HttpServer {
        let pool = LocalSessionPool::new(SolutionRegistry::new().into_factory(), 1);
        HttpServer::new(GatewayConfig::default(), Arc::new(pool))
    }

    #[tokio::test]
    async fn test_router_tags_and_dispatches() {
        use crate::content::Payload;
        use crate::session::{Operation, Solution};
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let registry = SolutionRegistry::new()
            .with(Solution::new("crm").operation("orders", Operation::Read, |_| Ok(Payload::from("ok"))));
        let pool = LocalSessionPool::new(registry.into_factory(), 1);
        let server = HttpServer::new(GatewayConfig::default(), Arc::new(pool));

        let request = Request::get("/rest_ws/crm/orders").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let request = Request::get("/").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_reload_swaps_config_and_auth() {
        let server = server();
        let inner = &server.state().inner;
        assert!(inner.auth.load().authorized_groups.is_none());

        let mut config = GatewayConfig::default();
        config.gateway.service_name = "api".into();
        config.auth.authorized_groups = Some(vec!["sales".into()]);
        config.auth.users.push(UserConfig {
            name: "alice".into(),
            password: "wonder".into(),
            groups: vec!["sales".into()],
        });
        inner.apply(config);

        assert_eq!(inner.config.load().gateway.service_name, "api");
        let auth = inner.auth.load();
        assert_eq!(auth.authorized_groups.as_deref(), Some(&["sales".to_string()][..]));
        assert!(auth.directory.check_password("alice", "wonder").is_some());
    }
}
