//! Access-control middleware
//!
//! Tower layer that runs the ban check and the rate check in front of the
//! routes, then feeds flagged response statuses back into the ban engine.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::api::RateDecision;
use super::ban::BanEngine;
use super::config::AttemptPolicy;
use super::error::RateLimitError;
use super::extractors::client_identity;
use super::limiter::RateLimiter;
use crate::app::{App, ServerMode};
use crate::extract::ClientIdentity;
use crate::prelude::*;
use wsgate_types::audit::AuditLog;

/// Access-control middleware layer
#[derive(Clone)]
pub struct AccessControlLayer {
	rate_limiter: Arc<RateLimiter>,
	ban_engine: Option<Arc<BanEngine>>,
	audit: Arc<dyn AuditLog>,
	policy: Arc<AttemptPolicy>,
	mode: ServerMode,
}

impl AccessControlLayer {
	pub fn new(
		rate_limiter: Arc<RateLimiter>,
		ban_engine: Option<Arc<BanEngine>>,
		audit: Arc<dyn AuditLog>,
		mode: ServerMode,
	) -> Self {
		Self { rate_limiter, ban_engine, audit, policy: Arc::new(AttemptPolicy::default()), mode }
	}

	pub fn with_policy(mut self, policy: AttemptPolicy) -> Self {
		self.policy = Arc::new(policy);
		self
	}

	pub fn from_app(app: &App) -> Self {
		Self::new(app.rate_limiter.clone(), app.ban_engine.clone(), app.audit.clone(), app.opts.mode)
			.with_policy(app.attempt_policy.clone())
	}
}

impl<S> Layer<S> for AccessControlLayer {
	type Service = AccessControlService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		AccessControlService {
			inner,
			rate_limiter: self.rate_limiter.clone(),
			ban_engine: self.ban_engine.clone(),
			audit: self.audit.clone(),
			policy: self.policy.clone(),
			mode: self.mode,
		}
	}
}

/// Access-control middleware service
#[derive(Clone)]
pub struct AccessControlService<S> {
	inner: S,
	rate_limiter: Arc<RateLimiter>,
	ban_engine: Option<Arc<BanEngine>>,
	audit: Arc<dyn AuditLog>,
	policy: Arc<AttemptPolicy>,
	mode: ServerMode,
}

impl<S> Service<Request<Body>> for AccessControlService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<Body>) -> Self::Future {
		// Use the service that was polled ready, leave a fresh clone behind
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);
		let rate_limiter = self.rate_limiter.clone();
		let ban_engine = self.ban_engine.clone();
		let audit = self.audit.clone();
		let policy = self.policy.clone();
		let mode = self.mode;

		Box::pin(async move {
			let identity = client_identity(&req, mode);
			let path = req.uri().path().to_owned();

			let config = rate_limiter.config();

			if let Some(ban_engine) = &ban_engine {
				if ban_engine.is_banned(&identity) {
					let stats = ban_engine.stats(&identity);
					warn!(
						identity = %identity,
						path = %path,
						method = %req.method(),
						"Blocked request from banned identity"
					);
					let mut response = RateLimitError::Banned {
						remaining_secs: stats.ban_time_remaining.unwrap_or(0),
						total_attempts: stats.total_attempts.unwrap_or(0),
					}
					.into_response();
					// Banned requests never reach the limiter, so only the limits are known
					if config.enabled {
						insert_limit_headers(response.headers_mut(), config.per_minute, config.per_hour);
					}
					return Ok(response);
				}
			}

			let decision = rate_limiter.allow(&identity);

			let mut response = if decision.allowed {
				req.extensions_mut().insert(ClientIdentity(identity.as_str().into()));
				inner.call(req).await?
			} else {
				debug!(identity = %identity, path = %path, "Rate limit exceeded");
				RateLimitError::RateLimited {
					remaining_minute: decision.remaining_minute,
					remaining_hour: decision.remaining_hour,
				}
				.into_response()
			};

			if config.enabled {
				insert_rate_headers(
					response.headers_mut(),
					config.per_minute,
					config.per_hour,
					&decision,
				);
			}

			if let Some(ban_engine) = &ban_engine {
				let status = response.status().as_u16();
				if policy.should_record(&path, status) {
					debug!(identity = %identity, path = %path, status, "Suspicious response recorded");
					if let Some(event) = ban_engine.record_attempt(&identity, &path, status) {
						tokio::spawn(async move {
							if let Err(err) = audit.log_ban(&event).await {
								warn!("Failed to write ban audit record: {}", err);
							}
						});
					}
				}
			}

			Ok(response)
		})
	}
}

fn insert_limit_headers(headers: &mut HeaderMap, per_minute: u32, per_hour: u32) {
	headers.insert("x-ratelimit-limit-minute", HeaderValue::from(per_minute));
	headers.insert("x-ratelimit-limit-hour", HeaderValue::from(per_hour));
}

fn insert_rate_headers(
	headers: &mut HeaderMap,
	per_minute: u32,
	per_hour: u32,
	decision: &RateDecision,
) {
	insert_limit_headers(headers, per_minute, per_hour);
	headers.insert("x-ratelimit-remaining-minute", HeaderValue::from(decision.remaining_minute));
	headers.insert("x-ratelimit-remaining-hour", HeaderValue::from(decision.remaining_hour));
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::SocketAddr;
	use std::time::Duration;

	use async_trait::async_trait;
	use axum::extract::ConnectInfo;
	use axum::http::StatusCode;
	use axum::routing::get;
	use axum::Router;
	use tower::ServiceExt;

	use crate::rate_limit::{BanConfig, RateLimitConfig};
	use wsgate_types::audit::{BanEvent, RequestLogEntry, TokenLogEntry};
	use wsgate_types::clock::ManualClock;

	#[derive(Debug, Default)]
	struct RecordingAudit {
		bans: std::sync::Mutex<Vec<BanEvent>>,
	}

	#[async_trait]
	impl AuditLog for RecordingAudit {
		async fn log_token(&self, _entry: &TokenLogEntry) -> GwResult<()> {
			Ok(())
		}

		async fn log_ban(&self, event: &BanEvent) -> GwResult<()> {
			self.bans.lock().unwrap().push(event.clone());
			Ok(())
		}

		async fn log_request(&self, _entry: &RequestLogEntry) -> GwResult<()> {
			Ok(())
		}
	}

	struct Fixture {
		router: Router,
		ban_engine: Arc<BanEngine>,
		audit: Arc<RecordingAudit>,
	}

	fn fixture(rate: RateLimitConfig, ban: BanConfig) -> Fixture {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
		let rate_limiter = Arc::new(RateLimiter::new(rate, clock.clone()));
		let ban_engine = Arc::new(BanEngine::new(ban, clock));
		let audit = Arc::new(RecordingAudit::default());

		let layer = AccessControlLayer::new(
			rate_limiter,
			Some(ban_engine.clone()),
			audit.clone(),
			ServerMode::Standalone,
		);

		let router = Router::new()
			.route("/connect/v1/token", get(|| async { StatusCode::CONFLICT }))
			.route("/open", get(|| async { "ok" }))
			.route("/open/missing", get(|| async { StatusCode::NOT_FOUND }))
			.route("/private", get(|| async { StatusCode::UNAUTHORIZED }))
			.route(
				"/whoami",
				get(|identity: ClientIdentity| async move { identity.as_str().to_string() }),
			)
			.layer(layer);

		Fixture { router, ban_engine, audit }
	}

	fn request(path: &str, peer: &str) -> Request<Body> {
		let mut req = Request::get(path).body(Body::empty()).unwrap();
		req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
		req
	}

	async fn call(router: &Router, path: &str, peer: &str) -> Response {
		router.clone().oneshot(request(path, peer)).await.unwrap()
	}

	fn strict_ban() -> BanConfig {
		BanConfig::new(3, Duration::from_secs(3600), Duration::from_secs(300))
	}

	#[tokio::test]
	async fn test_rate_headers_and_limit() {
		let fx = fixture(RateLimitConfig::new(2, 100, true), strict_ban());

		let first = call(&fx.router, "/open", "10.0.0.1:1000").await;
		assert_eq!(first.status(), StatusCode::OK);
		assert_eq!(first.headers()["x-ratelimit-limit-minute"], "2");
		assert_eq!(first.headers()["x-ratelimit-limit-hour"], "100");
		assert_eq!(first.headers()["x-ratelimit-remaining-minute"], "1");
		assert_eq!(first.headers()["x-ratelimit-remaining-hour"], "99");

		assert_eq!(call(&fx.router, "/open", "10.0.0.1:1000").await.status(), StatusCode::OK);

		let third = call(&fx.router, "/open", "10.0.0.1:1000").await;
		assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(third.headers()["x-ratelimit-remaining-minute"], "0");

		// 429 is never counted as a suspicious attempt
		assert!(!fx.ban_engine.stats("10.0.0.1").tracked);
	}

	#[tokio::test]
	async fn test_disabled_limiter_sends_no_headers() {
		let fx = fixture(RateLimitConfig::new(1, 1, false), strict_ban());

		for _ in 0..3 {
			let response = call(&fx.router, "/open", "10.0.0.1:1000").await;
			assert_eq!(response.status(), StatusCode::OK);
			assert!(response.headers().get("x-ratelimit-limit-minute").is_none());
		}
	}

	#[tokio::test]
	async fn test_failed_token_requests_ban() {
		let fx = fixture(RateLimitConfig::new(0, 0, true), strict_ban());

		for _ in 0..3 {
			let response = call(&fx.router, "/connect/v1/token", "10.0.0.5:1000").await;
			assert_eq!(response.status(), StatusCode::CONFLICT);
		}

		let blocked = call(&fx.router, "/open", "10.0.0.5:1000").await;
		assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
		let bytes = axum::body::to_bytes(blocked.into_body(), usize::MAX).await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(body["code"], "403");
		assert_eq!(body["details"]["ban_time_remaining"], 3600);
		assert_eq!(body["details"]["total_attempts"], 3);

		// Other callers are unaffected
		assert_eq!(call(&fx.router, "/open", "10.0.0.6:1000").await.status(), StatusCode::OK);

		// The ban audit record is written on a detached task
		for _ in 0..100 {
			if !fx.audit.bans.lock().unwrap().is_empty() {
				break;
			}
			tokio::task::yield_now().await;
		}
		let bans = fx.audit.bans.lock().unwrap();
		assert_eq!(bans.len(), 1);
		assert_eq!(&*bans[0].identity, "10.0.0.5");
		assert_eq!(&*bans[0].path, "/connect/v1/token");
	}

	#[tokio::test]
	async fn test_ban_response_carries_limit_headers() {
		let fx = fixture(RateLimitConfig::new(50, 500, true), strict_ban());

		for _ in 0..3 {
			call(&fx.router, "/private", "10.0.0.9:1000").await;
		}

		let blocked = call(&fx.router, "/open", "10.0.0.9:1000").await;
		assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
		assert_eq!(blocked.headers()["x-ratelimit-limit-minute"], "50");
		assert_eq!(blocked.headers()["x-ratelimit-limit-hour"], "500");
		assert!(blocked.headers().get("x-ratelimit-remaining-minute").is_none());
	}

	#[tokio::test]
	async fn test_status_classification() {
		let fx = fixture(RateLimitConfig::new(0, 0, true), strict_ban());

		// 404 on a regular route is not suspicious
		call(&fx.router, "/open/missing", "10.0.0.7:1000").await;
		assert!(!fx.ban_engine.stats("10.0.0.7").tracked);

		// 401 anywhere is
		call(&fx.router, "/private", "10.0.0.7:1000").await;
		assert_eq!(fx.ban_engine.stats("10.0.0.7").total_attempts, Some(1));
	}

	#[tokio::test]
	async fn test_whitelisted_peer_is_never_banned() {
		let fx = fixture(RateLimitConfig::new(0, 0, true), strict_ban());

		for _ in 0..10 {
			call(&fx.router, "/private", "127.0.0.1:1000").await;
		}
		assert_eq!(call(&fx.router, "/open", "127.0.0.1:1000").await.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_identity_reaches_handler() {
		let fx = fixture(RateLimitConfig::default(), strict_ban());

		let response = call(&fx.router, "/whoami", "192.0.2.1:1000").await;
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		assert_eq!(&bytes[..], b"192.0.2.1");
	}
}

// vim: ts=4
