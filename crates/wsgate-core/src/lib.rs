//! Core infrastructure for the wsgate gateway.
//!
//! Shared application state, the request guard, and the throttling layer
//! (rate limiter and ban engine) used by the server and the feature crates.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cleanup;
pub mod extensions;
pub mod extract;
pub mod guard;
pub mod prelude;
pub mod rate_limit;

// Re-export commonly used types
pub use app::{App, AppBuilderOpts, AppState, ServerMode};
pub use extract::ClientIdentity;

// vim: ts=4
