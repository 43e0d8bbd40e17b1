//! Application (API client) persistence collaborator

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
	Enabled,
	Disabled,
}

impl AppStatus {
	/// Stored status column: 1 = enabled, anything else = disabled
	pub fn from_code(code: i64) -> Self {
		if code == 1 { AppStatus::Enabled } else { AppStatus::Disabled }
	}

	pub fn code(self) -> i64 {
		match self {
			AppStatus::Enabled => 1,
			AppStatus::Disabled => 0,
		}
	}
}

/// Registered API client, as stored by the persistence layer
#[derive(Clone)]
pub struct Application {
	pub client_id: Box<str>,
	pub client_secret: Box<str>,
	pub status: AppStatus,
	/// Capability bitmask
	pub scope: i64,
	/// Token lifetime in seconds; non-positive means "use the default"
	pub token_lifetime_secs: i64,
	pub name: Box<str>,
}

impl Debug for Application {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Application")
			.field("client_id", &self.client_id)
			.field("client_secret", &"[REDACTED]")
			.field("status", &self.status)
			.field("scope", &self.scope)
			.field("token_lifetime_secs", &self.token_lifetime_secs)
			.field("name", &self.name)
			.finish()
	}
}

#[async_trait]
pub trait ApplicationStore: Debug + Send + Sync {
	/// Reads an application by client id.
	///
	/// Returns `Error::NotFound` for unknown ids. Disabled applications are
	/// returned as-is so the caller can tell them apart.
	async fn read_application(&self, client_id: &str) -> GwResult<Application>;

	/// Cheap connectivity probe
	async fn check_connection(&self) -> GwResult<()>;
}

// vim: ts=4
