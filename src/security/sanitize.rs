//! Header, body, and identifier sanitizers.

// crates.io
use uuid::Uuid;
// self
use crate::http::Headers;

/// Default cap applied to caller-supplied header values.
pub const DEFAULT_HEADER_VALUE_MAX: usize = 256;
/// Correlation header shared by client and server logs.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

const MAX_REQUEST_ID_LENGTH: usize = 128;

/// Whether `c` is a C0 control character or DEL.
pub fn is_control_char(c: char) -> bool {
	matches!(c, '\u{0}'..='\u{1F}' | '\u{7F}')
}

/// Removes C0 control characters and DEL.
pub fn strip_control_chars(value: &str) -> String {
	value.chars().filter(|c| !is_control_char(*c)).collect()
}

/// Strips control characters, trims, and truncates to `max_chars` characters.
///
/// The result can never smuggle CR/LF into a header line.
pub fn normalize_header_value(value: &str, max_chars: usize) -> String {
	let safe = strip_control_chars(value);
	let trimmed = safe.trim();

	match trimmed.char_indices().nth(max_chars) {
		Some((cut, _)) => trimmed[..cut].to_owned(),
		None => trimmed.to_owned(),
	}
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively; tokens containing whitespace are rejected.
pub fn parse_bearer_token(header: Option<&str>) -> Option<String> {
	let normalized = strip_control_chars(header?);
	let normalized = normalized.trim();
	let (scheme, rest) = normalized.split_at_checked(6)?;

	if !scheme.eq_ignore_ascii_case("bearer") || !rest.starts_with(char::is_whitespace) {
		return None;
	}

	let token = rest.trim();

	if token.is_empty() || token.contains(char::is_whitespace) {
		return None;
	}

	Some(token.to_owned())
}

/// Whether the request's media type (parameters ignored) is in `allowed`.
///
/// An empty allow-list accepts everything; a missing header is rejected otherwise.
pub fn validate_content_type<S>(headers: &Headers, allowed: &[S]) -> bool
where
	S: AsRef<str>,
{
	if allowed.is_empty() {
		return true;
	}

	let Some(content_type) = headers.get("content-type") else {
		return false;
	};
	let media_type = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	allowed.iter().any(|item| item.as_ref().trim().eq_ignore_ascii_case(&media_type))
}

/// Whether `body` fits within `max_bytes`.
pub fn enforce_max_body_size(body: impl AsRef<[u8]>, max_bytes: usize) -> bool {
	body.as_ref().len() <= max_bytes
}

/// Generates a fresh correlation id (UUID v4).
pub fn generate_request_id() -> String {
	Uuid::new_v4().to_string()
}

/// Returns the caller's `X-Correlation-ID` (normalized, at most 128 characters) or a fresh id.
pub fn resolve_request_id(headers: &Headers) -> String {
	headers
		.get(CORRELATION_ID_HEADER)
		.map(|value| normalize_header_value(value, MAX_REQUEST_ID_LENGTH))
		.filter(|value| !value.is_empty())
		.unwrap_or_else(generate_request_id)
}
