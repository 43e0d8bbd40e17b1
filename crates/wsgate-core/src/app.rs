//! App state type

use std::str::FromStr;
use std::sync::Arc;

use crate::cleanup::CleanupTask;
use crate::extensions::Extensions;
use crate::guard::GuardConfig;
use crate::prelude::*;
use crate::rate_limit::{AttemptPolicy, BanEngine, RateLimiter};

use wsgate_types::app_store::ApplicationStore;
use wsgate_types::audit::AuditLog;
use wsgate_types::clock::Clock;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
	/// Clients connect directly, the peer address is the identity
	Standalone,
	/// Behind a reverse proxy, forwarding headers carry the identity
	Proxy,
}

impl FromStr for ServerMode {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"standalone" => Ok(ServerMode::Standalone),
			"proxy" => Ok(ServerMode::Proxy),
			other => Err(Error::ValidationError(format!("unknown server mode: {}", other))),
		}
	}
}

pub struct AppState {
	pub opts: AppBuilderOpts,
	pub clock: Arc<dyn Clock>,

	pub app_store: Arc<dyn ApplicationStore>,
	pub audit: Arc<dyn AuditLog>,

	// Throttling
	pub rate_limiter: Arc<RateLimiter>,
	/// None when fail2ban is disabled
	pub ban_engine: Option<Arc<BanEngine>>,
	pub attempt_policy: AttemptPolicy,

	// Type-erased extension map for feature-specific state
	pub extensions: Extensions,
}

impl AppState {
	/// Get a registered extension by type. Returns error if not found.
	pub fn ext<T: Send + Sync + 'static>(&self) -> GwResult<&T> {
		self.extensions.get::<T>().ok_or_else(|| {
			Error::Internal(format!("Extension {} not registered", std::any::type_name::<T>()))
		})
	}

	/// Starts the periodic sweeps of the throttling state
	pub fn start_cleanup(&self) -> Vec<CleanupTask> {
		let mut tasks = vec![CleanupTask::spawn(self.rate_limiter.clone())];
		if let Some(ban_engine) = &self.ban_engine {
			tasks.push(CleanupTask::spawn(ban_engine.clone()));
		}
		tasks
	}
}

pub type App = Arc<AppState>;

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub mode: ServerMode,
	pub listen: Box<str>,
	pub guard: GuardConfig,
}

impl Default for AppBuilderOpts {
	fn default() -> Self {
		Self {
			mode: ServerMode::Standalone,
			listen: "0.0.0.0:8080".into(),
			guard: GuardConfig::default(),
		}
	}
}


// vim: ts=4
