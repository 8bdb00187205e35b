//! Unverified JWT payload inspection used for proactive refresh decisions.
//!
//! Signatures are never checked here; the server stays the authority on validity. The client
//! only reads `exp` to decide whether a refresh is worth attempting before a request.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use serde_json::Map;
// self
use crate::_prelude::*;

/// Decodes the payload segment of a compact JWT into a JSON object.
///
/// Returns `None` for fewer than two segments, an empty payload, invalid base64url, or a
/// payload that is not a JSON object.
pub fn decode_jwt_payload(token: &str) -> Option<Map<String, Value>> {
	let payload = token.split('.').nth(1).filter(|segment| !segment.is_empty())?;
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.or_else(|_| URL_SAFE.decode(payload))
		.ok()?;

	match serde_json::from_slice(&bytes).ok()? {
		Value::Object(map) => Some(map),
		_ => None,
	}
}

/// Reads the `exp` claim (seconds since the epoch) as an instant.
pub fn jwt_expires_at(token: &str) -> Option<OffsetDateTime> {
	let exp = decode_jwt_payload(token)?.get("exp")?.as_f64()?;

	if !exp.is_finite() {
		return None;
	}

	OffsetDateTime::from_unix_timestamp_nanos((exp * 1e9) as i128).ok()
}

/// Whether `token` expires within `margin` of `now`.
///
/// A token without a readable `exp` claim counts as expiring.
pub fn is_token_expiring_soon(token: &str, margin: Duration, now: OffsetDateTime) -> bool {
	match jwt_expires_at(token) {
		Some(expires_at) => expires_at - now < margin,
		None => true,
	}
}
