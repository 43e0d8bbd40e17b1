//! Rate Limiting API types
//!
//! Values returned by the limiter and the ban engine to the middleware and
//! the admin handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;

/// Outcome of a single [`RateLimiter::allow`](super::RateLimiter::allow) call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
	pub allowed: bool,
	pub remaining_minute: u32,
	pub remaining_hour: u32,
}

/// Per-identity ban engine statistics.
///
/// Unknown identities only carry `tracked = false`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct IpStats {
	pub tracked: bool,
	pub banned: Option<bool>,
	pub total_attempts: Option<u64>,
	/// Flagged events still inside the tracking window
	pub recent_attempts: Option<usize>,
	pub first_seen: Option<DateTime<Utc>>,
	pub last_seen: Option<DateTime<Utc>>,
	pub ban_expiry: Option<DateTime<Utc>>,
	/// Seconds until the ban lapses, 0 when not banned
	pub ban_time_remaining: Option<u64>,
}

impl IpStats {
	pub fn untracked() -> Self {
		Self::default()
	}
}

// vim: ts=4
