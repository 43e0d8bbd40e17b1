//! Custom extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::prelude::*;

// ClientIdentity //
//****************//
/// Caller identity resolved by the access-control middleware.
///
/// Empty when the caller address is unknown or the middleware is not
/// installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity(pub Box<str>);

impl ClientIdentity {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl<S> FromRequestParts<S> for ClientIdentity
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(parts.extensions.get::<ClientIdentity>().cloned().unwrap_or_default())
	}
}

// vim: ts=4
