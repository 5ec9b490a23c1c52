//! Request dispatch.
//!
//! # Responsibilities
//! - Map HTTP verbs onto session operations
//! - Own the checkout/checkin bracket around every operation call
//! - Assemble operation arguments from body, path and query
//! - Apply CORS, allow lists and response headers produced by operations
//!
//! # Design Decisions
//! - One handler for every path; the layout is validated by [`crate::routing`]
//! - Failures never escape the handler: each one becomes a status on the
//!   response being built, keeping the headers already set

pub mod args;
pub mod cors;
pub mod handler;

pub use handler::{dispatch_path, dispatch_root};
