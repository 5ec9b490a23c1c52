//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! Authorization header ─→ basic.rs (credentials)
//!                          │
//!          ┌───────────────┴────────────────┐
//!          ▼                                ▼
//!   scope has ws_authenticate        directory.rs (password check,
//!   hook → invoke(user, password)    group lookup against config)
//!          └───────────────┬────────────────┘
//!                          ▼
//!                chain.rs → AuthOutcome
//! ```
//!
//! # Design Decisions
//! - Evaluated fresh on every request; hook results are never cached
//! - A hook takes precedence over the configured groups
//! - Unauthenticated answers carry a challenge, unauthorized ones do not

pub mod basic;
pub mod chain;
pub mod directory;

pub use basic::Credentials;
pub use chain::{authenticate, AuthOutcome, AuthSettings};
pub use directory::{Directory, StaticDirectory};
