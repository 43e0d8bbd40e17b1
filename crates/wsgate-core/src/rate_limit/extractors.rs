//! Caller identity extraction
//!
//! The limiter and the ban engine key their records on the caller's IP
//! address as a string. An unknown caller maps to the empty identity.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;

use crate::app::ServerMode;

/// Extract client IP from request based on ServerMode
///
/// - Standalone mode: Use peer IP directly from ConnectInfo
/// - Proxy mode: Check forwarding headers first
pub fn extract_client_ip<B>(req: &Request<B>, mode: ServerMode) -> Option<IpAddr> {
	match mode {
		ServerMode::Standalone => peer_ip(req),
		ServerMode::Proxy => extract_from_xff(req)
			.or_else(|| extract_from_x_real_ip(req))
			.or_else(|| extract_from_forwarded(req))
			.or_else(|| peer_ip(req)),
	}
}

/// Identity string used as the throttling key
pub fn client_identity<B>(req: &Request<B>, mode: ServerMode) -> String {
	extract_client_ip(req, mode).map(|ip| ip.to_string()).unwrap_or_default()
}

fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip())
}

/// Extract IP from X-Forwarded-For header
fn extract_from_xff<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		// "client, proxy1, proxy2": the leftmost entry is the original client
		.and_then(|s| s.split(',').next().map(str::trim).and_then(|ip| ip.parse().ok()))
}

/// Extract IP from X-Real-IP header
fn extract_from_x_real_ip<B>(req: &Request<B>) -> Option<IpAddr> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.trim().parse().ok())
}

/// Extract IP from Forwarded header (RFC 7239)
fn extract_from_forwarded<B>(req: &Request<B>) -> Option<IpAddr> {
	let value = req.headers().get("forwarded")?.to_str().ok()?;

	// "for=192.0.2.60;proto=http" or "for=\"[2001:db8::1]:4711\""
	value.split([';', ',']).find_map(|part| {
		let (key, val) = part.trim().split_once('=')?;
		if !key.eq_ignore_ascii_case("for") {
			return None;
		}
		let val = val.trim_matches('"');
		if let Some(rest) = val.strip_prefix('[') {
			return rest.split(']').next()?.parse().ok();
		}
		val.parse::<IpAddr>()
			.ok()
			.or_else(|| val.parse::<SocketAddr>().ok().map(|sa| sa.ip()))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use std::net::{Ipv4Addr, Ipv6Addr};

	fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
		let mut builder = Request::builder().uri("/connect/v1/token");
		for (name, value) in headers {
			builder = builder.header(*name, *value);
		}
		let mut req = builder.body(Body::empty()).unwrap();
		if let Some(peer) = peer {
			req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
		}
		req
	}

	#[test]
	fn test_standalone_uses_peer() {
		let req = request(&[("x-forwarded-for", "1.2.3.4")], Some("10.0.0.5:5000"));
		assert_eq!(
			extract_client_ip(&req, ServerMode::Standalone),
			Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
		);
	}

	#[test]
	fn test_proxy_header_precedence() {
		let req = request(
			&[("x-forwarded-for", "1.2.3.4, 10.0.0.1"), ("x-real-ip", "5.6.7.8")],
			Some("10.0.0.5:5000"),
		);
		assert_eq!(client_identity(&req, ServerMode::Proxy), "1.2.3.4");

		let req = request(&[("x-real-ip", "5.6.7.8")], Some("10.0.0.5:5000"));
		assert_eq!(client_identity(&req, ServerMode::Proxy), "5.6.7.8");

		let req = request(&[], Some("10.0.0.5:5000"));
		assert_eq!(client_identity(&req, ServerMode::Proxy), "10.0.0.5");
	}

	#[test]
	fn test_forwarded_header() {
		let req = request(&[("forwarded", "for=192.0.2.60;proto=http;by=203.0.113.43")], None);
		assert_eq!(client_identity(&req, ServerMode::Proxy), "192.0.2.60");

		let req = request(&[("forwarded", "For=\"[2001:db8::1]:4711\"")], None);
		assert_eq!(
			extract_client_ip(&req, ServerMode::Proxy),
			Some(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)))
		);
	}

	#[test]
	fn test_unknown_caller_is_empty_identity() {
		let req = request(&[("x-forwarded-for", "garbage")], None);
		assert_eq!(client_identity(&req, ServerMode::Proxy), "");
		assert_eq!(client_identity(&req, ServerMode::Standalone), "");
	}
}

// vim: ts=4
