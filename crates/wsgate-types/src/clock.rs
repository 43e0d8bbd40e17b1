//! Time source used by the throttling and token components.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to. Used to drive window and expiry logic
/// deterministically.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self { now: Mutex::new(start) }
	}

	/// Starts at the given unix timestamp (seconds)
	pub fn at_unix(secs: i64) -> Self {
		Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock();
		*now += to_delta(by);
	}

	pub fn set(&self, to: DateTime<Utc>) {
		*self.now.lock() = to;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock()
	}
}

/// Converts a std duration, saturating instead of failing on overflow
pub fn to_delta(d: Duration) -> TimeDelta {
	TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}


// vim: ts=4
