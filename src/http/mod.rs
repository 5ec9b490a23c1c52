//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → dispatch (session checkout, operation call)
//!     → response.rs (status, headers, encoded body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::Draft;
pub use server::{AppState, GatewayState, HttpServer};
