//! Ban Engine
//!
//! Adaptive per-identity banning. Flagged responses are counted inside a
//! sliding window; reaching `max_attempts` bans the identity for
//! `ban_duration`. Expired bans are lifted lazily on the next lookup.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::api::IpStats;
use super::config::BanConfig;
use crate::cleanup::Sweep;
use crate::prelude::*;
use wsgate_types::audit::BanEvent;
use wsgate_types::clock::{to_delta, Clock};

#[derive(Debug, Clone)]
struct ClientAttemptRecord {
	attempts: VecDeque<DateTime<Utc>>,
	banned: bool,
	ban_expiry: DateTime<Utc>,
	total_attempts: u64,
	first_seen: DateTime<Utc>,
	last_seen: DateTime<Utc>,
}

impl ClientAttemptRecord {
	fn new(now: DateTime<Utc>) -> Self {
		Self {
			attempts: VecDeque::new(),
			banned: false,
			ban_expiry: now,
			total_attempts: 0,
			first_seen: now,
			last_seen: now,
		}
	}

	fn is_effectively_banned(&self, now: DateTime<Utc>) -> bool {
		self.banned && now < self.ban_expiry
	}

	/// Drops attempts that fell out of the window
	fn prune(&mut self, cutoff: DateTime<Utc>) {
		while self.attempts.front().is_some_and(|t| *t < cutoff) {
			self.attempts.pop_front();
		}
	}
}

/// Main ban engine
pub struct BanEngine {
	config: BanConfig,
	records: DashMap<String, ClientAttemptRecord>,
	clock: Arc<dyn Clock>,
}

impl BanEngine {
	pub fn new(config: BanConfig, clock: Arc<dyn Clock>) -> Self {
		Self { config, records: DashMap::new(), clock }
	}

	pub fn config(&self) -> &BanConfig {
		&self.config
	}

	pub fn is_whitelisted(&self, identity: &str) -> bool {
		self.config.whitelist.contains(identity)
	}

	/// Records a flagged response for `identity`.
	///
	/// Returns the ban event when this attempt pushed the identity over the
	/// threshold. Identities that are already banned are not re-banned.
	pub fn record_attempt(&self, identity: &str, path: &str, status: u16) -> Option<BanEvent> {
		if self.is_whitelisted(identity) {
			return None;
		}

		let now = self.clock.now();
		let cutoff = now - to_delta(self.config.window_duration);

		let event = {
			let mut record = self
				.records
				.entry(identity.to_owned())
				.or_insert_with(|| ClientAttemptRecord::new(now));

			record.total_attempts = record.total_attempts.saturating_add(1);
			record.last_seen = now;
			record.prune(cutoff);
			record.attempts.push_back(now);

			let threshold = self.config.max_attempts as usize;
			if record.attempts.len() >= threshold && !record.is_effectively_banned(now) {
				let ban_expiry = now + to_delta(self.config.ban_duration);
				record.banned = true;
				record.ban_expiry = ban_expiry;

				Some(BanEvent {
					identity: identity.into(),
					path: path.into(),
					status,
					attempts_in_window: record.attempts.len(),
					total_attempts: record.total_attempts,
					ban_duration: self.config.ban_duration,
					ban_expiry,
				})
			} else {
				None
			}
		};

		if let Some(event) = &event {
			warn!(
				identity = %event.identity,
				path = %event.path,
				status = event.status,
				attempts = event.attempts_in_window,
				expiry = %event.ban_expiry,
				"Identity banned"
			);
		}

		event
	}

	/// Whether `identity` is currently banned.
	///
	/// A ban whose expiry has passed is lifted here: the record goes back to
	/// tracking with an empty attempt history.
	pub fn is_banned(&self, identity: &str) -> bool {
		if self.is_whitelisted(identity) {
			return false;
		}

		let now = self.clock.now();
		match self.records.get(identity) {
			None => return false,
			Some(record) => {
				if !record.banned {
					return false;
				}
				if now < record.ban_expiry {
					return true;
				}
			}
		}

		let lifted = match self.records.get_mut(identity) {
			Some(mut record) if record.banned && now >= record.ban_expiry => {
				record.banned = false;
				record.attempts.clear();
				true
			}
			Some(record) => return record.is_effectively_banned(now),
			None => false,
		};

		if lifted {
			info!(identity = %identity, "Ban expired");
		}
		false
	}

	/// Lifts a ban manually. Returns whether anything changed.
	pub fn unban(&self, identity: &str) -> bool {
		let changed = match self.records.get_mut(identity) {
			Some(mut record) if record.banned => {
				record.banned = false;
				record.attempts.clear();
				true
			}
			_ => false,
		};

		if changed {
			info!(identity = %identity, "Identity unbanned");
		}
		changed
	}

	pub fn stats(&self, identity: &str) -> IpStats {
		let now = self.clock.now();
		let cutoff = now - to_delta(self.config.window_duration);

		let Some(record) = self.records.get(identity) else {
			return IpStats::untracked();
		};

		let banned = record.is_effectively_banned(now);
		let remaining = if banned {
			u64::try_from((record.ban_expiry - now).num_seconds()).unwrap_or(0)
		} else {
			0
		};

		IpStats {
			tracked: true,
			banned: Some(banned),
			total_attempts: Some(record.total_attempts),
			recent_attempts: Some(record.attempts.iter().filter(|t| **t >= cutoff).count()),
			first_seen: Some(record.first_seen),
			last_seen: Some(record.last_seen),
			ban_expiry: banned.then_some(record.ban_expiry),
			ban_time_remaining: Some(remaining),
		}
	}

	/// Identities whose ban has not lapsed yet
	pub fn banned_identities(&self) -> Vec<String> {
		let now = self.clock.now();
		self.records
			.iter()
			.filter(|entry| entry.value().is_effectively_banned(now))
			.map(|entry| entry.key().clone())
			.collect()
	}

	pub fn tracked_count(&self) -> usize {
		self.records.len()
	}
}

impl Sweep for BanEngine {
	fn name(&self) -> &'static str {
		"ban_engine"
	}

	fn interval(&self) -> std::time::Duration {
		self.config.cleanup_interval
	}

	/// Evicts records that are not banned and have been idle past retention
	fn sweep(&self) -> usize {
		let now = self.clock.now();
		let idle_cutoff = now - to_delta(self.config.retention);
		let before = self.records.len();

		self.records
			.retain(|_, record| record.is_effectively_banned(now) || record.last_seen >= idle_cutoff);

		let removed = before.saturating_sub(self.records.len());
		if removed > 0 {
			debug!(removed, tracked = self.records.len(), "Ban engine sweep");
		}
		removed
	}
}


// vim: ts=4
