//! Shared types, collaborator traits, and core utilities for wsgate.
//!
//! The persistence and audit layers are consumed through the traits in
//! [`app_store`] and [`audit`]; adapter crates implement them without
//! depending on the HTTP side of the gateway.

#![forbid(unsafe_code)]

pub mod app_store;
pub mod audit;
pub mod clock;
pub mod error;
pub mod prelude;

// vim: ts=4
