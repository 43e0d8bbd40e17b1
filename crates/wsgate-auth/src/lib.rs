//! Token issuance subsystem.
//!
//! OAuth-style `client_credentials` grant: applications authenticate with
//! `Basic` credentials and receive a signed, time-bounded access token.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod handler;
pub mod issuer;
pub mod scope;
pub mod token;

mod prelude;

use crate::prelude::*;

pub use issuer::TokenIssuer;
pub use token::{IssuedToken, TokenConfig, TokenError};

/// Registers the token issuer in the app state extensions
pub fn init(state: &mut AppState, config: TokenConfig) -> GwResult<()> {
	if let Err(err) = config.validate() {
		error!("FATAL: Invalid token configuration: {}", err);
		return Err(err);
	}
	let issuer =
		TokenIssuer::new(config, state.app_store.clone(), state.audit.clone(), state.clock.clone());
	state.extensions.insert(issuer);
	Ok(())
}


// vim: ts=4
