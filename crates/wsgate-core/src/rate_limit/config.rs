//! Rate Limiting Configuration
//!
//! Configuration structs for the dual-window request limiter and the
//! adaptive ban engine.

use std::collections::HashSet;
use std::time::Duration;

/// Dual-window (minute + hour) request limits
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
	/// Requests per minute, 0 = unlimited
	pub per_minute: u32,
	/// Requests per hour, 0 = unlimited
	pub per_hour: u32,
	/// Master switch; when off every request is allowed
	pub enabled: bool,
	/// How often expired entries are swept
	pub cleanup_interval: Duration,
}

impl RateLimitConfig {
	pub fn new(per_minute: u32, per_hour: u32, enabled: bool) -> Self {
		Self { per_minute, per_hour, enabled, ..Self::default() }
	}
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			per_minute: 60,
			per_hour: 1000,
			enabled: true,
			cleanup_interval: Duration::from_secs(60),
		}
	}
}

/// Adaptive ban ("fail2ban") configuration
#[derive(Clone, Debug)]
pub struct BanConfig {
	/// Flagged events inside the window that trigger a ban (at least 1)
	pub max_attempts: u32,
	/// How long a ban lasts
	pub ban_duration: Duration,
	/// Sliding window in which flagged events are counted
	pub window_duration: Duration,
	/// How often idle records are swept
	pub cleanup_interval: Duration,
	/// Idle records (not banned) older than this are evicted by the sweep
	pub retention: Duration,
	/// Identities that are never banned
	pub whitelist: HashSet<String>,
}

impl BanConfig {
	pub fn new(max_attempts: u32, ban_duration: Duration, window_duration: Duration) -> Self {
		Self { max_attempts: max_attempts.max(1), ban_duration, window_duration, ..Self::default() }
	}

	pub fn with_whitelist(mut self, ips: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.whitelist = ips.into_iter().map(Into::into).collect();
		self
	}

	/// Three strikes in five minutes, one hour ban
	pub fn strict() -> Self {
		Self::new(3, Duration::from_secs(3600), Duration::from_secs(300))
	}
}

impl Default for BanConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			ban_duration: Duration::from_secs(30 * 60),
			window_duration: Duration::from_secs(10 * 60),
			cleanup_interval: Duration::from_secs(5 * 60),
			retention: Duration::from_secs(3600),
			whitelist: ["127.0.0.1", "::1"].into_iter().map(String::from).collect(),
		}
	}
}

/// Decides which final response statuses count as flagged events
#[derive(Clone, Debug)]
pub struct AttemptPolicy {
	/// Routes where any caller-fault status (except 429) is flagged
	pub sensitive_paths: HashSet<String>,
}

impl AttemptPolicy {
	pub fn new(sensitive_paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self { sensitive_paths: sensitive_paths.into_iter().map(Into::into).collect() }
	}

	/// 401 and 403 are always flagged; on sensitive routes every other 4xx
	/// except 429 is flagged as well.
	pub fn should_record(&self, path: &str, status: u16) -> bool {
		match status {
			401 | 403 => true,
			429 => false,
			400..=499 => self.sensitive_paths.contains(path),
			_ => false,
		}
	}
}

impl Default for AttemptPolicy {
	fn default() -> Self {
		Self::new(["/connect/v1/token", "/connect/v1/wsteste"])
	}
}


// vim: ts=4
