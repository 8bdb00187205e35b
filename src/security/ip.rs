//! Client IP extraction behind reverse proxies.

// std
use std::net::{IpAddr, SocketAddr};
// self
use crate::{http::Headers, security::sanitize::strip_control_chars};

/// Proxy headers consulted by default, highest priority first.
pub const DEFAULT_CLIENT_IP_HEADERS: [&str; 3] =
	["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Parses one address candidate, tolerating `1.2.3.4:80`, `[::1]`, and `[::1]:80` forms.
pub fn parse_ip_candidate(value: &str) -> Option<IpAddr> {
	let trimmed = strip_control_chars(value);
	let trimmed = trimmed.trim();

	if trimmed.is_empty() {
		return None;
	}
	if let Ok(ip) = trimmed.parse::<IpAddr>() {
		return Some(ip);
	}
	if let Some(inner) = trimmed.strip_prefix('[').and_then(|rest| rest.split(']').next()) {
		return inner.parse().ok();
	}

	trimmed.parse::<SocketAddr>().ok().map(|addr| addr.ip())
}

/// Whether `value` is a valid IPv4 or IPv6 address (ports and brackets tolerated).
pub fn is_valid_ip_address(value: &str) -> bool {
	parse_ip_candidate(value).is_some()
}

/// Returns the first valid client IP found in `priority` order.
///
/// For each header only the first comma-separated entry is considered; an invalid entry falls
/// through to the next header.
pub fn extract_client_ip<S>(headers: &Headers, priority: &[S]) -> Option<IpAddr>
where
	S: AsRef<str>,
{
	priority.iter().find_map(|name| {
		let first = headers.get(name.as_ref())?.split(',').next()?;

		parse_ip_candidate(first)
	})
}
