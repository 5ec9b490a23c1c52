//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → mount prefix stripped (config: gateway.mount_path)
//!     → path.rs (split into service marker, session key, scope, args)
//!     → RequestPath or InvalidPath
//! ```
//!
//! # Design Decisions
//! - Parsing is a pure function, no state
//! - Invalid paths are rejected before any session is touched
//! - No URL-decoding beyond what the transport already did

pub mod path;

pub use path::{parse_path, strip_mount, RequestPath};
