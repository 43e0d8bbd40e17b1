//! Admin API endpoints.
//!
//! Inspection and manual override of the ban engine state.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod fail2ban;

mod prelude;

use axum::routing::{get, post};
use axum::Router;

use crate::prelude::*;

/// Routes under `/connect/v1/fail2ban`
pub fn routes() -> Router<App> {
	Router::new()
		.route("/connect/v1/fail2ban/status", get(fail2ban::get_status))
		.route("/connect/v1/fail2ban/unban", post(fail2ban::post_unban))
		.route("/connect/v1/fail2ban/ip/{ip}", get(fail2ban::get_ip_stats))
}


// vim: ts=4
