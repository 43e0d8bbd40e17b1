//! Token types: issuer configuration, claims, outcome codes and the wire
//! response of the token endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;

/// Default token lifetime (24 hours)
pub const DEFAULT_TOKEN_LIFETIME: i64 = 86400;

#[derive(Clone)]
pub struct TokenConfig {
	/// HMAC signing secret
	pub secret: Box<str>,
	pub issuer: Box<str>,
	/// Offset in hours subtracted from the current time to compute `nbf`
	pub timezone_hours: i64,
	/// Used when the application has no positive lifetime of its own
	pub default_lifetime: i64,
	/// Licensed module bitmask echoed in every successful response
	pub modules: i64,
}

impl std::fmt::Debug for TokenConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenConfig")
			.field("secret", &"[REDACTED]")
			.field("issuer", &self.issuer)
			.field("timezone_hours", &self.timezone_hours)
			.field("default_lifetime", &self.default_lifetime)
			.field("modules", &self.modules)
			.finish()
	}
}

impl Default for TokenConfig {
	fn default() -> Self {
		Self {
			secret: "".into(),
			issuer: "wsgate".into(),
			timezone_hours: 0,
			default_lifetime: DEFAULT_TOKEN_LIFETIME,
			modules: 0,
		}
	}
}

impl TokenConfig {
	/// UTC offsets in use worldwide
	pub const TIMEZONE_RANGE: std::ops::RangeInclusive<i64> = -12..=14;

	/// Rejects configurations that cannot issue verifiable tokens
	pub fn validate(&self) -> GwResult<()> {
		if self.secret.is_empty() {
			return Err(Error::ValidationError("JWT secret key is not configured".into()));
		}
		if !Self::TIMEZONE_RANGE.contains(&self.timezone_hours) {
			return Err(Error::ValidationError(format!(
				"JWT timezone offset {} is outside {:?}",
				self.timezone_hours,
				Self::TIMEZONE_RANGE
			)));
		}
		Ok(())
	}
}

/// JWT payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	pub iss: String,
	pub nbf: i64,
	pub exp: i64,
	pub client_id: String,
	pub scope: String,
	/// Application name
	pub aplicacao: String,
}

/// A freshly signed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
	pub access_token: Box<str>,
	pub not_before: i64,
	pub expires_at: i64,
	pub scope: String,
	pub modules: i64,
	pub client_id: Box<str>,
	pub application_name: Box<str>,
}

/// Token request failures, each with its fixed outcome code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
	/// Missing `Basic` authorization or wrong grant type
	MalformedHeaders,
	/// Undecodable credentials or empty client id / secret
	MalformedCredentials,
	/// The application store failed
	LookupFailed,
	UnknownApplication,
	DisabledApplication,
	SecretMismatch,
	SigningFailure,
}

impl TokenError {
	pub fn code(self) -> &'static str {
		match self {
			TokenError::MalformedHeaders => "001",
			TokenError::MalformedCredentials => "002",
			TokenError::LookupFailed => "003",
			TokenError::UnknownApplication => "004",
			TokenError::SecretMismatch => "005",
			TokenError::DisabledApplication => "006",
			TokenError::SigningFailure => "008",
		}
	}

	pub fn status(self) -> StatusCode {
		match self {
			TokenError::MalformedHeaders | TokenError::MalformedCredentials => {
				StatusCode::UNAUTHORIZED
			}
			TokenError::LookupFailed => StatusCode::FORBIDDEN,
			TokenError::UnknownApplication
			| TokenError::DisabledApplication
			| TokenError::SecretMismatch => StatusCode::CONFLICT,
			TokenError::SigningFailure => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn message(self) -> &'static str {
		match self {
			TokenError::MalformedHeaders => {
				"The Authorization and Grant_type headers must be provided correctly."
			}
			TokenError::MalformedCredentials => "Invalid Client_id or Client_secret content.",
			TokenError::LookupFailed => "Failed to verify application.",
			TokenError::UnknownApplication => {
				"Application validation failed. Client_Id invalid or disabled."
			}
			TokenError::DisabledApplication => "Application disabled.",
			TokenError::SecretMismatch => "Invalid Client_secret.",
			TokenError::SigningFailure => "Failed to generate JWT token.",
		}
	}
}

impl std::fmt::Display for TokenError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} ({})", self.message(), self.code())
	}
}

impl std::error::Error for TokenError {}

impl IntoResponse for TokenError {
	fn into_response(self) -> Response {
		(self.status(), Json(TokenResponse::from(self))).into_response()
	}
}

/// Body of the token endpoint, success and failure alike
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	pub code: String,
	pub message: Option<String>,
	pub access_token: Option<String>,
	pub token_type: Option<String>,
	/// Absolute expiry (unix seconds)
	pub expires_in: Option<i64>,
	/// Not-before (unix seconds)
	pub datetime: Option<i64>,
	pub scope: Option<String>,
	pub modulos: Option<i64>,
}

impl From<&IssuedToken> for TokenResponse {
	fn from(token: &IssuedToken) -> Self {
		Self {
			code: "000".into(),
			message: None,
			access_token: Some(token.access_token.to_string()),
			token_type: Some("Bearer".into()),
			expires_in: Some(token.expires_at),
			datetime: Some(token.not_before),
			scope: Some(token.scope.clone()),
			modulos: Some(token.modules),
		}
	}
}

impl From<TokenError> for TokenResponse {
	fn from(err: TokenError) -> Self {
		Self { code: err.code().into(), message: Some(err.message().into()), ..Self::default() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_validation() {
		assert!(matches!(TokenConfig::default().validate(), Err(Error::ValidationError(_))));

		let config = TokenConfig { secret: "k".into(), ..TokenConfig::default() };
		assert!(config.validate().is_ok());

		for timezone_hours in [-12, 14] {
			assert!(TokenConfig { timezone_hours, ..config.clone() }.validate().is_ok());
		}
		for timezone_hours in [-13, 15, i64::MAX / 1000] {
			let res = TokenConfig { timezone_hours, ..config.clone() }.validate();
			assert!(matches!(res, Err(Error::ValidationError(_))));
		}
	}

	#[test]
	fn test_error_codes() {
		let cases = [
			(TokenError::MalformedHeaders, "001", 401),
			(TokenError::MalformedCredentials, "002", 401),
			(TokenError::LookupFailed, "003", 403),
			(TokenError::UnknownApplication, "004", 409),
			(TokenError::SecretMismatch, "005", 409),
			(TokenError::DisabledApplication, "006", 409),
			(TokenError::SigningFailure, "008", 500),
		];
		for (err, code, status) in cases {
			assert_eq!(err.code(), code);
			assert_eq!(err.status().as_u16(), status);
		}
	}

	#[test]
	fn test_failure_body_has_only_code_and_message() {
		let body = serde_json::to_value(TokenResponse::from(TokenError::SecretMismatch)).unwrap();
		assert_eq!(body, serde_json::json!({ "code": "005", "message": "Invalid Client_secret." }));
	}

	#[test]
	fn test_config_debug_hides_secret() {
		let config = TokenConfig { secret: "hunter2".into(), ..TokenConfig::default() };
		assert!(!format!("{:?}", config).contains("hunter2"));
	}
}

// vim: ts=4
