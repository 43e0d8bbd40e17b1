//! Ban engine administration endpoints

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;
use wsgate_core::extract::ClientIdentity;
use wsgate_core::rate_limit::{BanEngine, IpStats};

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct StatusResponse {
	pub banned_ips: Vec<String>,
	pub banned_count: usize,
	pub ip_stats: Option<IpStats>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
	pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnbanRequest {
	pub ip: String,
}

/// `{code, message, ip}` answer of the per-IP endpoints
#[derive(Debug, Serialize)]
pub struct IpResult {
	pub code: String,
	pub message: String,
	pub ip: String,
}

impl IpResult {
	fn response(status: StatusCode, message: &str, ip: String) -> Response {
		let body = IpResult { code: status.as_str().into(), message: message.into(), ip };
		(status, Json(body)).into_response()
	}
}

fn ban_engine(app: &App) -> GwResult<&Arc<BanEngine>> {
	app.ban_engine
		.as_ref()
		.ok_or_else(|| Error::ServiceUnavailable("Fail2ban is not enabled".into()))
}

/// GET /connect/v1/fail2ban/status - List banned identities, optionally with stats for one
pub async fn get_status(
	State(app): State<App>,
	admin: ClientIdentity,
	Query(query): Query<StatusQuery>,
) -> GwResult<Json<StatusResponse>> {
	let engine = ban_engine(&app)?;
	let banned_ips = engine.banned_identities();
	let query_ip = query.ip.filter(|ip| !ip.is_empty());

	info!(
		admin_ip = %admin.as_str(),
		banned_count = banned_ips.len(),
		query_ip = ?query_ip,
		"Fail2ban status query"
	);

	Ok(Json(StatusResponse {
		banned_count: banned_ips.len(),
		ip_stats: query_ip.map(|ip| engine.stats(&ip)),
		banned_ips,
	}))
}

/// POST /connect/v1/fail2ban/unban - Lift a ban manually
pub async fn post_unban(
	State(app): State<App>,
	admin: ClientIdentity,
	req: Result<Json<UnbanRequest>, JsonRejection>,
) -> GwResult<Response> {
	let Json(req) = req.map_err(|err| Error::ValidationError(format!("Invalid parameters: {}", err)))?;
	if req.ip.trim().is_empty() {
		return Err(Error::ValidationError("Invalid parameters: ip is required".into()));
	}

	let engine = ban_engine(&app)?;
	if engine.unban(&req.ip) {
		info!(ip = %req.ip, admin_ip = %admin.as_str(), "Ban lifted manually");
		Ok(IpResult::response(StatusCode::OK, "IP unbanned", req.ip))
	} else {
		Ok(IpResult::response(StatusCode::NOT_FOUND, "IP is not banned or not found", req.ip))
	}
}

/// GET /connect/v1/fail2ban/ip/{ip} - Statistics of one identity
pub async fn get_ip_stats(
	State(app): State<App>,
	admin: ClientIdentity,
	Path(ip): Path<String>,
) -> GwResult<Response> {
	let engine = ban_engine(&app)?;
	let stats = engine.stats(&ip);
	if !stats.tracked {
		return Ok(IpResult::response(StatusCode::NOT_FOUND, "IP is not being tracked", ip));
	}

	info!(ip = %ip, admin_ip = %admin.as_str(), "Fail2ban IP stats query");
	Ok(Json(stats).into_response())
}

// vim: ts=4
