//! Request guard middleware
//!
//! Outermost layer of the access-control pipeline: caps the request body,
//! enforces a per-request deadline and stamps security headers on every
//! response.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body_util::Limited;

use crate::prelude::*;

#[derive(Clone, Debug)]
pub struct GuardConfig {
	/// Maximum request body in bytes, 0 = unlimited
	pub max_body_size: usize,
	/// Per-request deadline, zero = none
	pub request_timeout: Duration,
	/// Adds Strict-Transport-Security when set
	pub tls_enabled: bool,
}

impl Default for GuardConfig {
	fn default() -> Self {
		Self {
			max_body_size: 1024 * 1024,
			request_timeout: Duration::from_secs(30),
			tls_enabled: false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardError {
	BodyTooLarge { max: usize },
	RequestTimeout,
}

impl std::fmt::Display for GuardError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			GuardError::BodyTooLarge { max } => {
				write!(f, "Request body too large. Max size: {} bytes", max)
			}
			GuardError::RequestTimeout => write!(f, "Request timeout"),
		}
	}
}

impl std::error::Error for GuardError {}

impl IntoResponse for GuardError {
	fn into_response(self) -> Response {
		let status = match self {
			GuardError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
			GuardError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
		};
		(status, Json(ErrorBody::for_status(status, self.to_string()))).into_response()
	}
}

/// Request guard, installed with `middleware::from_fn_with_state`
pub async fn request_guard(
	State(config): State<Arc<GuardConfig>>,
	req: Request,
	next: Next,
) -> Response {
	let mut response = guarded(&config, req, next).await;
	add_security_headers(response.headers_mut(), config.tls_enabled);
	response
}

async fn guarded(config: &GuardConfig, req: Request, next: Next) -> Response {
	let req = if config.max_body_size > 0 {
		if content_length(req.headers()).is_some_and(|len| len > config.max_body_size) {
			debug!(uri = %req.uri(), max = config.max_body_size, "Rejected oversized request body");
			return GuardError::BodyTooLarge { max: config.max_body_size }.into_response();
		}
		let (parts, body) = req.into_parts();
		Request::from_parts(parts, Body::new(Limited::new(body, config.max_body_size)))
	} else {
		req
	};

	let response = if config.request_timeout.is_zero() {
		next.run(req).await
	} else {
		let uri = req.uri().clone();
		match tokio::time::timeout(config.request_timeout, next.run(req)).await {
			Ok(response) => response,
			Err(_) => {
				warn!(uri = %uri, timeout_secs = config.request_timeout.as_secs(), "Request timed out");
				return GuardError::RequestTimeout.into_response();
			}
		}
	};

	// A streamed body that overran the limit surfaces as a bare 413 from the
	// extractor
	if config.max_body_size > 0 && response.status() == StatusCode::PAYLOAD_TOO_LARGE {
		return GuardError::BodyTooLarge { max: config.max_body_size }.into_response();
	}

	response
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
	headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

fn add_security_headers(headers: &mut HeaderMap, tls_enabled: bool) {
	headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
	headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
	headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
	headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
	if tls_enabled {
		headers.insert(
			header::STRICT_TRANSPORT_SECURITY,
			HeaderValue::from_static("max-age=31536000; includeSubDomains"),
		);
	}
}


// vim: ts=4
