//! Rate Limiting Error Types
//!
//! Rejections produced by the access-control middleware before the request
//! reaches a route handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Rate limit error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
	/// One of the request windows is exhausted
	RateLimited {
		remaining_minute: u32,
		remaining_hour: u32,
	},
	/// Identity is banned
	Banned {
		/// Seconds until the ban lapses
		remaining_secs: u64,
		total_attempts: u64,
	},
}

impl std::fmt::Display for RateLimitError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RateLimitError::RateLimited { remaining_minute, remaining_hour } => {
				write!(
					f,
					"Rate limited (remaining minute: {}, hour: {})",
					remaining_minute, remaining_hour
				)
			}
			RateLimitError::Banned { remaining_secs, .. } => {
				write!(f, "Identity banned for {}s", remaining_secs)
			}
		}
	}
}

impl std::error::Error for RateLimitError {}

impl IntoResponse for RateLimitError {
	fn into_response(self) -> Response {
		match self {
			RateLimitError::RateLimited { .. } => {
				let body = serde_json::json!({
					"code": "429",
					"message": "Rate limit exceeded. Please try again later.",
				});
				(StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
			}
			RateLimitError::Banned { remaining_secs, total_attempts } => {
				let body = serde_json::json!({
					"code": "403",
					"message": "Access blocked due to repeated suspicious attempts. Try again later.",
					"details": {
						"ban_time_remaining": remaining_secs,
						"total_attempts": total_attempts,
					}
				});
				let mut response = (StatusCode::FORBIDDEN, Json(body)).into_response();
				if let Ok(val) = remaining_secs.to_string().parse() {
					response.headers_mut().insert("Retry-After", val);
				}
				response
			}
		}
	}
}


// vim: ts=4
