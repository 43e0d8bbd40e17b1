//! Error type shared by the gateway crates.
//!
//! Every error the gateway answers with is rendered as the fixed
//! `{code, message}` body, see [`ErrorBody`].

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;

pub type GwResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	ValidationError(String),
	ServiceUnavailable(String),
	DbError,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	pub fn status(&self) -> StatusCode {
		match self {
			Error::NotFound => StatusCode::NOT_FOUND,
			Error::PermissionDenied => StatusCode::FORBIDDEN,
			Error::ValidationError(_) => StatusCode::BAD_REQUEST,
			Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			Error::DbError | Error::Internal(_) | Error::Io(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ServiceUnavailable(msg) => write!(f, "service unavailable: {}", msg),
			Error::DbError => write!(f, "database error"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

/// The `{code, message}` response body used by every failure the gateway emits
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
	pub code: String,
	pub message: String,
}

impl ErrorBody {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { code: code.into(), message: message.into() }
	}

	/// Body whose code is the numeric HTTP status, e.g. `"429"`
	pub fn for_status(status: StatusCode, message: impl Into<String>) -> Self {
		Self::new(status.as_str(), message)
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = match &self {
			// Internal details stay in the log
			Error::DbError | Error::Internal(_) | Error::Io(_) => {
				tracing::error!(error = %self, "request failed");
				"Internal server error".to_string()
			}
			Error::NotFound => "Not found".to_string(),
			Error::PermissionDenied => "Permission denied".to_string(),
			Error::ValidationError(msg) | Error::ServiceUnavailable(msg) => msg.clone(),
		};
		(status, Json(ErrorBody::for_status(status, message))).into_response()
	}
}


// vim: ts=4
