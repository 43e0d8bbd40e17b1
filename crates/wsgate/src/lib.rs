//! wsgate is a back-office REST gateway with an adaptive access-control
//! pipeline.
//!
//! # Features
//!
//! - Dual-window rate limiting (per minute and per hour)
//! - Adaptive banning of callers that keep failing
//!     - whitelist
//!     - expiring bans
//!     - admin endpoints for inspection and manual unban
//! - Client-credentials token issuance (signed JWT)
//! - Request guard: body size limit, deadline, security headers

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

// Re-export shared types and collaborator traits from wsgate-types
pub use wsgate_types::app_store;
pub use wsgate_types::audit;
pub use wsgate_types::clock;
pub use wsgate_types::error;

// Feature crate re-exports
pub use wsgate_admin as admin;
pub use wsgate_auth as auth;
pub use wsgate_core::guard;
pub use wsgate_core::rate_limit;

// Local modules
pub mod app;
pub mod cors;
pub mod prelude;
pub mod routes;

pub use crate::app::{App, AppBuilder, ServerMode};

// vim: ts=4
