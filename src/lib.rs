//! REST gateway library.
//!
//! Exposes pooled, stateful business-logic sessions over HTTP. A request
//! to `/{service}/{solution}/{scope}/{args...}` checks a session out of the
//! pool, runs the operation the verb maps to, and encodes the result in the
//! format the client asked for.

pub mod auth;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
