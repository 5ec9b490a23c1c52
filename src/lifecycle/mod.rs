//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve shutdown_signal()
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast to server → stop accepting → drain in-flight
//!     requests (sessions are released as their guards drop) → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - In-flight blocking session work is never aborted, only awaited

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
