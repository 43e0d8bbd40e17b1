//! Client-credentials token issuer
//!
//! Validates a `Basic` client id / secret pair against the application store
//! and signs an HS256 access token for it. The issuer keeps no mutable state;
//! every request reads the application afresh.

use std::sync::Arc;

use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::prelude::*;
use crate::scope::scope_names;
use crate::token::{IssuedToken, TokenClaims, TokenConfig, TokenError};
use wsgate_types::app_store::{AppStatus, ApplicationStore};
use wsgate_types::audit::{AuditLog, TokenLogEntry};
use wsgate_types::clock::Clock;

const GRANT_TYPE: &str = "client_credentials";

pub struct TokenIssuer {
	config: TokenConfig,
	encoding_key: EncodingKey,
	app_store: Arc<dyn ApplicationStore>,
	audit: Arc<dyn AuditLog>,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenIssuer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenIssuer").field("config", &self.config).finish_non_exhaustive()
	}
}

impl TokenIssuer {
	pub fn new(
		config: TokenConfig,
		app_store: Arc<dyn ApplicationStore>,
		audit: Arc<dyn AuditLog>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
		Self { config, encoding_key, app_store, audit, clock }
	}

	pub fn config(&self) -> &TokenConfig {
		&self.config
	}

	/// Runs the whole issuance flow for one token request.
	///
	/// `authorization` and `grant_type` are the raw header values, `host` is
	/// only recorded in the audit log.
	pub async fn issue_token(
		&self,
		authorization: Option<&str>,
		grant_type: Option<&str>,
		host: Option<&str>,
	) -> Result<IssuedToken, TokenError> {
		let (client_id, client_secret) = parse_basic_credentials(authorization, grant_type)?;
		debug!(client_id = %client_id, "Token requested");

		let app = match self.app_store.read_application(&client_id).await {
			Ok(app) => app,
			Err(Error::NotFound) => {
				info!(client_id = %client_id, "Token request for unknown application");
				return Err(TokenError::UnknownApplication);
			}
			Err(err) => {
				error!(client_id = %client_id, "Application lookup failed: {}", err);
				return Err(TokenError::LookupFailed);
			}
		};

		if app.status != AppStatus::Enabled {
			info!(client_id = %client_id, "Token request for disabled application");
			return Err(TokenError::DisabledApplication);
		}

		if !secrets_match(&app.client_secret, &client_secret) {
			info!(client_id = %client_id, "Client secret mismatch");
			return Err(TokenError::SecretMismatch);
		}

		let not_before = self
			.clock
			.now()
			.timestamp()
			.saturating_sub(self.config.timezone_hours.saturating_mul(3600));
		let lifetime = if app.token_lifetime_secs > 0 {
			app.token_lifetime_secs
		} else {
			self.config.default_lifetime
		};
		let expires_at = not_before.saturating_add(lifetime);
		let scope = scope_names(app.scope);

		let claims = TokenClaims {
			iss: self.config.issuer.to_string(),
			nbf: not_before,
			exp: expires_at,
			client_id: client_id.clone(),
			scope: scope.clone(),
			aplicacao: app.name.to_string(),
		};
		let access_token: Box<str> =
			encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
				.map_err(|err| {
					error!(client_id = %client_id, "Token signing failed: {}", err);
					TokenError::SigningFailure
				})?
				.into();

		let entry = TokenLogEntry {
			client_id: client_id.as_str().into(),
			token: access_token.clone(),
			host: host.map(Into::into),
			not_before,
			expires_at,
		};
		if let Err(err) = self.audit.log_token(&entry).await {
			warn!(client_id = %client_id, "Failed to write token audit record: {}", err);
		}

		info!(client_id = %client_id, nbf = not_before, exp = expires_at, "Token issued");

		Ok(IssuedToken {
			access_token,
			not_before,
			expires_at,
			scope,
			modules: self.config.modules,
			client_id: client_id.into(),
			application_name: app.name,
		})
	}
}

/// Checks the request headers and extracts `(client_id, client_secret)`
fn parse_basic_credentials(
	authorization: Option<&str>,
	grant_type: Option<&str>,
) -> Result<(String, String), TokenError> {
	let authorization = strip_nul(authorization.unwrap_or_default());
	let encoded = authorization
		.strip_prefix("Basic ")
		.filter(|_| grant_type == Some(GRANT_TYPE))
		.ok_or(TokenError::MalformedHeaders)?;

	let decoded = base64::engine::general_purpose::STANDARD
		.decode(encoded)
		.map_err(|_| TokenError::MalformedCredentials)?;
	let decoded = String::from_utf8(decoded).map_err(|_| TokenError::MalformedCredentials)?;
	let decoded = strip_nul(&decoded);

	match decoded.split_once(':') {
		Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
			Ok((id.to_string(), secret.to_string()))
		}
		_ => Err(TokenError::MalformedCredentials),
	}
}

fn strip_nul(s: &str) -> String {
	s.replace('\0', "")
}

/// Constant-time comparison. Hashing first hides the secret length as well.
fn secrets_match(stored: &str, provided: &str) -> bool {
	let stored = Sha256::digest(stored.as_bytes());
	let provided = Sha256::digest(provided.as_bytes());
	stored.as_slice().ct_eq(provided.as_slice()).into()
}


// vim: ts=4
