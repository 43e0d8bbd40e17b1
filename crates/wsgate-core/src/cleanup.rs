//! Periodic cleanup of in-memory throttling state
//!
//! Each component that accumulates per-identity records implements [`Sweep`].
//! [`CleanupTask::spawn`] runs the sweep on a fixed interval until the task
//! is shut down or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

pub trait Sweep: Send + Sync + 'static {
	/// Name used in log lines
	fn name(&self) -> &'static str;

	/// How often the sweep should run
	fn interval(&self) -> Duration;

	/// Removes stale records, returns how many were removed
	fn sweep(&self) -> usize;
}

/// Handle of a running cleanup loop
pub struct CleanupTask {
	name: &'static str,
	cancel: CancellationToken,
	handle: Option<JoinHandle<()>>,
}

impl CleanupTask {
	/// Starts the sweep loop. Must be called inside a tokio runtime.
	pub fn spawn<T: Sweep>(target: Arc<T>) -> Self {
		let name = target.name();
		let period = target.interval().max(Duration::from_millis(10));
		let cancel = CancellationToken::new();
		let token = cancel.clone();

		let handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			// The first tick completes immediately
			interval.tick().await;

			loop {
				tokio::select! {
					() = token.cancelled() => break,
					_ = interval.tick() => {
						let removed = target.sweep();
						if removed > 0 {
							debug!(task = name, removed, "Cleanup sweep finished");
						}
					}
				}
			}
			debug!(task = name, "Cleanup task stopped");
		});

		info!(task = name, period_secs = period.as_secs(), "Cleanup task started");
		Self { name, cancel, handle: Some(handle) }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| !h.is_finished())
	}

	/// Stops the loop and waits for it to exit
	pub async fn shutdown(mut self) {
		self.cancel.cancel();
		if let Some(handle) = self.handle.take() {
			if let Err(err) = handle.await {
				warn!(task = self.name, "Cleanup task ended abnormally: {}", err);
			}
		}
	}
}

impl Drop for CleanupTask {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}


// vim: ts=4
