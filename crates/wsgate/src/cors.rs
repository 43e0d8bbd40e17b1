//! CORS policy

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::prelude::*;

const GRANT_TYPE: HeaderName = HeaderName::from_static("grant_type");
const CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

#[derive(Clone, Debug)]
pub struct CorsConfig {
	/// Empty means any origin
	pub allowed_origins: Vec<Box<str>>,
	/// Only sent for explicitly listed origins
	pub allow_credentials: bool,
	/// Preflight cache lifetime
	pub max_age: Duration,
}

impl Default for CorsConfig {
	fn default() -> Self {
		Self {
			allowed_origins: Vec::new(),
			allow_credentials: true,
			max_age: Duration::from_secs(12 * 3600),
		}
	}
}

impl CorsConfig {
	pub fn with_origins(origins: impl IntoIterator<Item = impl Into<Box<str>>>) -> Self {
		Self { allowed_origins: origins.into_iter().map(Into::into).collect(), ..Self::default() }
	}

	/// Builds the tower-http layer
	pub fn layer(&self) -> CorsLayer {
		let layer = CorsLayer::new()
			.allow_methods([
				Method::GET,
				Method::POST,
				Method::PUT,
				Method::PATCH,
				Method::DELETE,
				Method::OPTIONS,
			])
			.allow_headers([
				header::ORIGIN,
				header::CONTENT_TYPE,
				header::CONTENT_LENGTH,
				header::ACCEPT_ENCODING,
				header::AUTHORIZATION,
				GRANT_TYPE,
				CSRF_TOKEN,
			])
			.expose_headers([header::CONTENT_LENGTH])
			.max_age(self.max_age);

		if self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| &**o == "*") {
			// Wildcard origin cannot be combined with credentials
			return layer.allow_origin(Any);
		}

		let origins: Vec<HeaderValue> = self
			.allowed_origins
			.iter()
			.filter_map(|origin| match HeaderValue::from_str(origin) {
				Ok(value) => Some(value),
				Err(_) => {
					warn!(origin = %origin, "Ignoring invalid CORS origin");
					None
				}
			})
			.collect();

		layer.allow_origin(AllowOrigin::list(origins)).allow_credentials(self.allow_credentials)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use axum::routing::get;
	use axum::Router;
	use tower::ServiceExt;

	fn router(config: &CorsConfig) -> Router {
		Router::new().route("/ping", get(|| async { "pong" })).layer(config.layer())
	}

	fn with_origin(origin: &str) -> Request<Body> {
		Request::get("/ping").header(header::ORIGIN, origin).body(Body::empty()).unwrap()
	}

	#[tokio::test]
	async fn test_any_origin() {
		let response = router(&CorsConfig::default()).oneshot(with_origin("https://a.example")).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
		assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
	}

	#[tokio::test]
	async fn test_listed_origin() {
		let config = CorsConfig::with_origins(["https://a.example"]);

		let response = router(&config).oneshot(with_origin("https://a.example")).await.unwrap();
		assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.example");
		assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

		let response = router(&config).oneshot(with_origin("https://b.example")).await.unwrap();
		assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
	}

	#[tokio::test]
	async fn test_preflight() {
		let config = CorsConfig::with_origins(["https://a.example"]);
		let req = Request::builder()
			.method(Method::OPTIONS)
			.uri("/ping")
			.header(header::ORIGIN, "https://a.example")
			.header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
			.body(Body::empty())
			.unwrap();

		let response = router(&config).oneshot(req).await.unwrap();
		assert!(response.status().is_success());
		assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "43200");
		let allowed = response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
		assert!(allowed.contains("grant_type"));
	}
}

// vim: ts=4
