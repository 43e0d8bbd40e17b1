//! Rate Limiter
//!
//! Per-caller dual-window request counter. Each identity carries a minute and
//! an hour counter; a counter is zeroed once its window has run out and the
//! window is re-anchored at the current time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::api::RateDecision;
use super::config::RateLimitConfig;
use crate::cleanup::Sweep;
use crate::prelude::*;
use wsgate_types::clock::Clock;

#[derive(Debug, Clone)]
struct RateState {
	minute_count: u32,
	minute_reset_at: DateTime<Utc>,
	hour_count: u32,
	hour_reset_at: DateTime<Utc>,
}

impl RateState {
	fn first_seen(now: DateTime<Utc>) -> Self {
		Self {
			minute_count: 1,
			minute_reset_at: now + TimeDelta::minutes(1),
			hour_count: 1,
			hour_reset_at: now + TimeDelta::hours(1),
		}
	}

	fn check(&mut self, now: DateTime<Utc>, per_minute: u32, per_hour: u32) -> RateDecision {
		if now >= self.minute_reset_at {
			self.minute_count = 0;
			self.minute_reset_at = now + TimeDelta::minutes(1);
		}
		if now >= self.hour_reset_at {
			self.hour_count = 0;
			self.hour_reset_at = now + TimeDelta::hours(1);
		}

		if per_minute > 0 && self.minute_count >= per_minute {
			return RateDecision {
				allowed: false,
				remaining_minute: 0,
				remaining_hour: per_hour.saturating_sub(self.hour_count),
			};
		}
		if per_hour > 0 && self.hour_count >= per_hour {
			return RateDecision {
				allowed: false,
				remaining_minute: per_minute.saturating_sub(self.minute_count),
				remaining_hour: 0,
			};
		}

		self.minute_count = self.minute_count.saturating_add(1);
		self.hour_count = self.hour_count.saturating_add(1);

		RateDecision {
			allowed: true,
			remaining_minute: per_minute.saturating_sub(self.minute_count),
			remaining_hour: per_hour.saturating_sub(self.hour_count),
		}
	}
}

/// Main rate limiter
pub struct RateLimiter {
	config: RateLimitConfig,
	clients: DashMap<String, RateState>,
	clock: Arc<dyn Clock>,
	/// Statistics
	total_limited: AtomicU64,
}

impl RateLimiter {
	pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
		Self { config, clients: DashMap::new(), clock, total_limited: AtomicU64::new(0) }
	}

	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Counts a request for `identity` and decides whether it may proceed.
	///
	/// Every allowed call mutates the identity's counters, so the whole
	/// read-modify-write happens under the entry's shard lock.
	pub fn allow(&self, identity: &str) -> RateDecision {
		let per_minute = self.config.per_minute;
		let per_hour = self.config.per_hour;

		if !self.config.enabled {
			return RateDecision {
				allowed: true,
				remaining_minute: per_minute,
				remaining_hour: per_hour,
			};
		}

		let now = self.clock.now();
		let decision = match self.clients.entry(identity.to_owned()) {
			Entry::Vacant(entry) => {
				entry.insert(RateState::first_seen(now));
				RateDecision {
					allowed: true,
					remaining_minute: per_minute.saturating_sub(1),
					remaining_hour: per_hour.saturating_sub(1),
				}
			}
			Entry::Occupied(mut entry) => entry.get_mut().check(now, per_minute, per_hour),
		};

		if !decision.allowed {
			self.total_limited.fetch_add(1, Ordering::Relaxed);
		}

		decision
	}

	/// Number of identities currently tracked
	pub fn tracked_count(&self) -> usize {
		self.clients.len()
	}

	/// Total requests denied since startup
	pub fn total_limited(&self) -> u64 {
		self.total_limited.load(Ordering::Relaxed)
	}
}

impl Sweep for RateLimiter {
	fn name(&self) -> &'static str {
		"rate_limiter"
	}

	fn interval(&self) -> std::time::Duration {
		self.config.cleanup_interval
	}

	/// Evicts identities whose hour window has fully expired
	fn sweep(&self) -> usize {
		let now = self.clock.now();
		let before = self.clients.len();
		self.clients.retain(|_, state| now < state.hour_reset_at);
		let removed = before.saturating_sub(self.clients.len());

		if removed > 0 {
			debug!(removed, tracked = self.clients.len(), "Rate limiter sweep");
		}
		removed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use wsgate_types::clock::ManualClock;

	fn limiter(per_minute: u32, per_hour: u32) -> (RateLimiter, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
		let limiter = RateLimiter::new(RateLimitConfig::new(per_minute, per_hour, true), clock.clone());
		(limiter, clock)
	}

	#[test]
	fn test_minute_limit_within_one_second() {
		let (limiter, _clock) = limiter(2, 100);

		assert!(limiter.allow("A").allowed);
		assert!(limiter.allow("A").allowed);
		let third = limiter.allow("A");
		assert!(!third.allowed);
		assert_eq!(third.remaining_minute, 0);
		assert_eq!(third.remaining_hour, 98);
		assert_eq!(limiter.total_limited(), 1);
	}

	#[test]
	fn test_remaining_counts() {
		let (limiter, _clock) = limiter(5, 10);

		let first = limiter.allow("A");
		assert_eq!((first.remaining_minute, first.remaining_hour), (4, 9));
		let second = limiter.allow("A");
		assert_eq!((second.remaining_minute, second.remaining_hour), (3, 8));
	}

	#[test]
	fn test_identities_are_independent() {
		let (limiter, _clock) = limiter(1, 100);

		assert!(limiter.allow("A").allowed);
		assert!(!limiter.allow("A").allowed);
		assert!(limiter.allow("B").allowed);
	}

	#[test]
	fn test_minute_window_resets() {
		let (limiter, clock) = limiter(2, 100);

		assert!(limiter.allow("A").allowed);
		assert!(limiter.allow("A").allowed);
		assert!(!limiter.allow("A").allowed);

		clock.advance(Duration::from_secs(59));
		assert!(!limiter.allow("A").allowed);

		clock.advance(Duration::from_secs(1));
		assert!(limiter.allow("A").allowed);
	}

	#[test]
	fn test_hour_limit_reports_remaining_minute() {
		let (limiter, clock) = limiter(2, 3);

		assert!(limiter.allow("A").allowed);
		assert!(limiter.allow("A").allowed);
		clock.advance(Duration::from_secs(60));
		assert!(limiter.allow("A").allowed);

		let denied = limiter.allow("A");
		assert!(!denied.allowed);
		assert_eq!(denied.remaining_hour, 0);
		assert_eq!(denied.remaining_minute, 1);

		clock.advance(Duration::from_secs(3600));
		assert!(limiter.allow("A").allowed);
	}

	#[test]
	fn test_zero_limit_is_unlimited() {
		let (limiter, _clock) = limiter(0, 0);

		for _ in 0..500 {
			assert!(limiter.allow("A").allowed);
		}
	}

	#[test]
	fn test_disabled_always_allows() {
		let clock = Arc::new(ManualClock::at_unix(0));
		let limiter = RateLimiter::new(RateLimitConfig::new(1, 1, false), clock);

		for _ in 0..10 {
			let decision = limiter.allow("A");
			assert!(decision.allowed);
		}
		assert_eq!(limiter.tracked_count(), 0);
	}

	#[test]
	fn test_empty_identity_is_a_key() {
		let (limiter, _clock) = limiter(1, 10);

		assert!(limiter.allow("").allowed);
		assert!(!limiter.allow("").allowed);
	}

	#[test]
	fn test_sweep_evicts_expired_hour_windows() {
		let (limiter, clock) = limiter(10, 100);

		limiter.allow("A");
		clock.advance(Duration::from_secs(1800));
		limiter.allow("B");

		assert_eq!(limiter.sweep(), 0);
		clock.advance(Duration::from_secs(1800));
		assert_eq!(limiter.sweep(), 1);
		assert_eq!(limiter.tracked_count(), 1);
	}

	#[test]
	fn test_concurrent_grants_never_exceed_limit() {
		let (limiter, _clock) = limiter(50, 1000);
		let limiter = Arc::new(limiter);
		let granted = AtomicU64::new(0);

		std::thread::scope(|s| {
			for _ in 0..8 {
				s.spawn(|| {
					for _ in 0..20 {
						if limiter.allow("shared").allowed {
							granted.fetch_add(1, Ordering::Relaxed);
						}
					}
				});
			}
		});

		assert_eq!(granted.load(Ordering::Relaxed), 50);
	}
}

// vim: ts=4
