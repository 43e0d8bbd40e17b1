//! Audit log collaborator.
//!
//! The gateway hands issuance, ban and request records to an [`AuditLog`]
//! implementation. Emission is best-effort: callers log failures and carry on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

/// A successfully issued access token
#[derive(Debug, Clone)]
pub struct TokenLogEntry {
	pub client_id: Box<str>,
	pub token: Box<str>,
	pub host: Option<Box<str>>,
	/// Unix seconds
	pub not_before: i64,
	/// Unix seconds
	pub expires_at: i64,
}

/// Emitted by the ban engine when an identity crosses the attempt threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEvent {
	pub identity: Box<str>,
	pub path: Box<str>,
	pub status: u16,
	pub attempts_in_window: usize,
	pub total_attempts: u64,
	pub ban_duration: Duration,
	pub ban_expiry: DateTime<Utc>,
}

/// One handled API request
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
	pub request_id: Box<str>,
	pub method: Box<str>,
	pub endpoint: Box<str>,
	pub status: u16,
	pub client_id: Option<Box<str>>,
	pub application_name: Option<Box<str>>,
	pub client_ip: Box<str>,
	pub started_at: DateTime<Utc>,
	pub duration_ms: i64,
	pub response: Box<str>,
}

#[async_trait]
pub trait AuditLog: Debug + Send + Sync {
	async fn log_token(&self, entry: &TokenLogEntry) -> GwResult<()>;

	async fn log_ban(&self, event: &BanEvent) -> GwResult<()>;

	async fn log_request(&self, entry: &RequestLogEntry) -> GwResult<()>;
}

/// Audit sink that only writes to the tracing log. Used when no database
/// audit trail is configured.
#[derive(Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
	async fn log_token(&self, entry: &TokenLogEntry) -> GwResult<()> {
		info!(
			client_id = %entry.client_id,
			nbf = entry.not_before,
			exp = entry.expires_at,
			"audit: token issued"
		);
		Ok(())
	}

	async fn log_ban(&self, event: &BanEvent) -> GwResult<()> {
		info!(
			identity = %event.identity,
			path = %event.path,
			status = event.status,
			expiry = %event.ban_expiry,
			"audit: identity banned"
		);
		Ok(())
	}

	async fn log_request(&self, entry: &RequestLogEntry) -> GwResult<()> {
		debug!(
			request_id = %entry.request_id,
			endpoint = %entry.endpoint,
			status = entry.status,
			duration_ms = entry.duration_ms,
			"audit: request"
		);
		Ok(())
	}
}

// vim: ts=4
