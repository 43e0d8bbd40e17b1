//! Rate limiting and adaptive banning
//!
//! - [`RateLimiter`]: per-identity minute and hour request windows
//! - [`BanEngine`]: bans identities that keep producing suspicious responses
//! - [`AccessControlLayer`]: tower layer wiring both into the router

pub mod api;
pub mod ban;
pub mod config;
pub mod error;
pub mod extractors;
pub mod limiter;
pub mod middleware;

pub use api::{IpStats, RateDecision};
pub use ban::BanEngine;
pub use config::{AttemptPolicy, BanConfig, RateLimitConfig};
pub use error::RateLimitError;
pub use extractors::{client_identity, extract_client_ip};
pub use limiter::RateLimiter;
pub use middleware::{AccessControlLayer, AccessControlService};

// vim: ts=4
