//! `/connect/v1` endpoints: token issuance and the connectivity probe

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::issuer::TokenIssuer;
use crate::prelude::*;
use crate::token::TokenResponse;
use wsgate_core::app::VERSION;
use wsgate_core::extract::ClientIdentity;
use wsgate_types::audit::RequestLogEntry;

/// Probe response
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
	pub code: String,
	pub message: Option<String>,
	#[serde(rename = "versao")]
	pub version: Option<String>,
	#[serde(rename = "erro")]
	pub error: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|h| h.to_str().ok())
}

struct RequestLog<'a> {
	app: &'a App,
	endpoint: &'static str,
	identity: &'a ClientIdentity,
	started_at: DateTime<Utc>,
}

impl RequestLog<'_> {
	/// Hands the request record to the audit log on a detached task
	fn emit(
		self,
		status: StatusCode,
		client_id: Option<&str>,
		application_name: Option<&str>,
		response: String,
	) {
		let now = self.app.clock.now();
		let entry = RequestLogEntry {
			request_id: uuid::Uuid::new_v4().to_string().into(),
			method: "GET".into(),
			endpoint: self.endpoint.into(),
			status: status.as_u16(),
			client_id: client_id.map(Into::into),
			application_name: application_name.map(Into::into),
			client_ip: self.identity.as_str().into(),
			started_at: self.started_at,
			duration_ms: (now - self.started_at).num_milliseconds(),
			response: response.into(),
		};

		let audit = self.app.audit.clone();
		tokio::spawn(async move {
			if let Err(err) = audit.log_request(&entry).await {
				warn!(endpoint = %entry.endpoint, "Failed to write request audit record: {}", err);
			}
		});
	}
}

/// GET /connect/v1/token - Issue an access token for `Basic` client credentials
pub async fn get_token(
	State(app): State<App>,
	identity: ClientIdentity,
	headers: HeaderMap,
) -> Result<Response, Error> {
	let issuer = app.ext::<TokenIssuer>()?;
	let log = RequestLog {
		app: &app,
		endpoint: "/connect/v1/token",
		identity: &identity,
		started_at: app.clock.now(),
	};

	let authorization = header_str(&headers, header::AUTHORIZATION.as_str());
	let grant_type = header_str(&headers, "grant_type");
	let host = header_str(&headers, header::HOST.as_str());
	info!(client_ip = %identity.as_str(), host = ?host, "Token request");

	let (status, body, client_id, app_name) =
		match issuer.issue_token(authorization, grant_type, host).await {
			Ok(token) => (
				StatusCode::OK,
				TokenResponse::from(&token),
				Some(token.client_id),
				Some(token.application_name),
			),
			Err(err) => {
				debug!(code = err.code(), "Token request rejected");
				(err.status(), TokenResponse::from(err), None, None)
			}
		};

	log.emit(
		status,
		client_id.as_deref(),
		app_name.as_deref(),
		serde_json::to_string(&body).unwrap_or_default(),
	);

	Ok((status, Json(body)).into_response())
}

/// GET /connect/v1/wsteste - Check that the application store is reachable
pub async fn get_wsteste(State(app): State<App>, identity: ClientIdentity) -> Response {
	let log = RequestLog {
		app: &app,
		endpoint: "/connect/v1/wsteste",
		identity: &identity,
		started_at: app.clock.now(),
	};

	let (status, body) = match app.app_store.check_connection().await {
		Ok(()) => (
			StatusCode::OK,
			ProbeResponse { code: "000".into(), version: Some(VERSION.into()), ..Default::default() },
		),
		Err(err) => {
			error!("Connectivity probe failed: {}", err);
			(
				StatusCode::FORBIDDEN,
				ProbeResponse {
					code: "005".into(),
					message: Some("Failed to open the database.".into()),
					error: Some(err.to_string()),
					..Default::default()
				},
			)
		}
	};

	log.emit(status, None, None, serde_json::to_string(&body).unwrap_or_default());
	(status, Json(body)).into_response()
}

// vim: ts=4
