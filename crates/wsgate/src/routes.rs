//! Router assembly
//!
//! Layer order, outermost first: trace, request guard, access control, CORS.

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::cors::CorsConfig;
use crate::prelude::*;
use wsgate_core::guard::request_guard;
use wsgate_core::rate_limit::AccessControlLayer;

fn init_api() -> Router<App> {
	Router::new()
		.route("/connect/v1/token", get(wsgate_auth::handler::get_token))
		.route("/connect/v1/wsteste", get(wsgate_auth::handler::get_wsteste))
		.merge(wsgate_admin::routes())
}

pub fn init(app: App, cors: &CorsConfig) -> Router {
	let guard = Arc::new(app.opts.guard.clone());

	init_api()
		.layer(cors.layer())
		.layer(AccessControlLayer::from_app(&app))
		.layer(middleware::from_fn_with_state(guard, request_guard))
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::SocketAddr;
	use std::time::Duration;

	use async_trait::async_trait;
	use axum::body::Body;
	use axum::extract::ConnectInfo;
	use axum::http::{header, Request, StatusCode};
	use axum::response::Response;
	use base64::Engine;
	use tower::ServiceExt;

	use crate::app::AppBuilder;
	use wsgate_core::rate_limit::{BanConfig, RateLimitConfig};
	use wsgate_types::app_store::{AppStatus, Application, ApplicationStore};
	use wsgate_types::clock::ManualClock;

	#[derive(Debug)]
	struct OneApp;

	#[async_trait]
	impl ApplicationStore for OneApp {
		async fn read_application(&self, client_id: &str) -> GwResult<Application> {
			match client_id {
				"app1" => Ok(Application {
					client_id: "app1".into(),
					client_secret: "s3cret".into(),
					status: AppStatus::Enabled,
					scope: 5,
					token_lifetime_secs: 3600,
					name: "Loja".into(),
				}),
				_ => Err(Error::NotFound),
			}
		}

		async fn check_connection(&self) -> GwResult<()> {
			Ok(())
		}
	}

	fn router(rate: RateLimitConfig, ban: Option<BanConfig>) -> (App, Router) {
		let mut builder = AppBuilder::new();
		builder
			.clock(Arc::new(ManualClock::at_unix(1_700_000_000)))
			.app_store(Arc::new(OneApp))
			.rate_limit(rate)
			.jwt_secret("test-secret")
			.max_body_size(64);
		if let Some(ban) = ban {
			builder.fail2ban(ban);
		} else {
			builder.disable_fail2ban();
		}
		builder.build().unwrap()
	}

	fn basic(user: &str, pass: &str) -> String {
		let raw = format!("{}:{}", user, pass);
		format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
	}

	fn token_request(peer: &str, authorization: &str) -> Request<Body> {
		let mut req = Request::get("/connect/v1/token")
			.header(header::AUTHORIZATION, authorization)
			.header("Grant_type", "client_credentials")
			.body(Body::empty())
			.unwrap();
		req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
		req
	}

	fn get_request(uri: &str, peer: &str) -> Request<Body> {
		let mut req = Request::get(uri).body(Body::empty()).unwrap();
		req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
		req
	}

	async fn json(response: Response) -> serde_json::Value {
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn test_token_through_pipeline() {
		let (_app, router) = router(RateLimitConfig::default(), Some(BanConfig::strict()));

		let response =
			router.oneshot(token_request("10.1.0.1:5000", &basic("app1", "s3cret"))).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()["x-content-type-options"], "nosniff");
		assert_eq!(response.headers()["x-ratelimit-limit-minute"], "60");
		assert_eq!(response.headers()["x-ratelimit-remaining-minute"], "59");

		let body = json(response).await;
		assert_eq!(body["code"], "000");
		assert_eq!(body["scope"], "clientes ofertas");
		assert_eq!(body["expires_in"], 1_700_000_000 + 3600);
	}

	#[tokio::test]
	async fn test_repeated_failures_ban_caller() {
		let (app, router) = router(RateLimitConfig::default(), Some(BanConfig::strict()));
		let wrong = basic("app1", "wrong");

		for _ in 0..3 {
			let response = router.clone().oneshot(token_request("10.1.0.2:5000", &wrong)).await.unwrap();
			assert_eq!(response.status(), StatusCode::CONFLICT);
		}

		// Correct credentials no longer help
		let response = router
			.clone()
			.oneshot(token_request("10.1.0.2:5000", &basic("app1", "s3cret")))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::FORBIDDEN);
		assert_eq!(response.headers()[header::RETRY_AFTER], "3600");
		let body = json(response).await;
		assert_eq!(body["details"]["total_attempts"], 3);

		// Other callers are unaffected
		let response =
			router.oneshot(token_request("10.1.0.3:5000", &basic("app1", "s3cret"))).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let engine = app.ban_engine.as_ref().unwrap();
		assert!(engine.is_banned("10.1.0.2"));
	}

	#[tokio::test]
	async fn test_admin_unban_restores_access() {
		let (_app, router) = router(RateLimitConfig::default(), Some(BanConfig::strict()));
		let wrong = basic("app1", "wrong");
		for _ in 0..3 {
			router.clone().oneshot(token_request("10.1.0.4:5000", &wrong)).await.unwrap();
		}

		let status = router.clone().oneshot(get_request("/connect/v1/fail2ban/status", "127.0.0.1:4000")).await.unwrap();
		let body = json(status).await;
		assert_eq!(body["banned_count"], 1);
		assert_eq!(body["banned_ips"][0], "10.1.0.4");

		let mut unban = Request::post("/connect/v1/fail2ban/unban")
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(r#"{"ip":"10.1.0.4"}"#))
			.unwrap();
		unban.extensions_mut().insert(ConnectInfo("127.0.0.1:4000".parse::<SocketAddr>().unwrap()));
		let response = router.clone().oneshot(unban).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let response =
			router.oneshot(token_request("10.1.0.4:5000", &basic("app1", "s3cret"))).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_rate_limit_applies_before_routes() {
		let (_app, router) = router(RateLimitConfig::new(2, 100, true), None);

		for _ in 0..2 {
			let response = router.clone().oneshot(get_request("/connect/v1/wsteste", "10.1.0.5:1")).await.unwrap();
			assert_eq!(response.status(), StatusCode::OK);
		}
		let response = router.oneshot(get_request("/connect/v1/wsteste", "10.1.0.5:1")).await.unwrap();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers()["x-frame-options"], "DENY");
		assert_eq!(json(response).await["code"], "429");
	}

	#[tokio::test]
	async fn test_admin_without_fail2ban() {
		let (_app, router) = router(RateLimitConfig::default(), None);

		let response = router.oneshot(get_request("/connect/v1/fail2ban/status", "10.1.0.6:1")).await.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	}

	#[tokio::test]
	async fn test_oversized_body_rejected() {
		let (_app, router) = router(RateLimitConfig::default(), Some(BanConfig::strict()));

		let mut req = Request::post("/connect/v1/fail2ban/unban")
			.header(header::CONTENT_TYPE, "application/json")
			.header(header::CONTENT_LENGTH, "1000")
			.body(Body::from("x".repeat(1000)))
			.unwrap();
		req.extensions_mut().insert(ConnectInfo("10.1.0.7:1".parse::<SocketAddr>().unwrap()));

		let response = router.oneshot(req).await.unwrap();
		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
		assert_eq!(json(response).await["code"], "413");
	}

	#[tokio::test]
	async fn test_unknown_route() {
		let (_app, router) = router(RateLimitConfig::default(), Some(BanConfig::strict()));

		let response = router.oneshot(get_request("/nope", "10.1.0.8:1")).await.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(response.headers()["x-content-type-options"], "nosniff");
	}

	#[test]
	fn test_default_request_timeout() {
		let (app, _router) = router(RateLimitConfig::default(), None);
		assert_eq!(app.opts.guard.request_timeout, Duration::from_secs(30));
	}
}

// vim: ts=4
