//! Open-redirect guards for post-login `next` parameters and external hand-offs.

// self
use crate::{_prelude::*, security::origin::origin_of};

/// Whether `path` is a same-origin absolute path that is safe to redirect to.
///
/// Rejects empty values, control characters or whitespace, anything not starting with `/`,
/// protocol-relative `//host` forms, backslashes, and scheme-looking prefixes such as
/// `/javascript:`.
pub fn is_safe_redirect_path(path: &str) -> bool {
	if path.is_empty() || path.chars().any(|c| c.is_control() || c.is_whitespace()) {
		return false;
	}
	if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
		return false;
	}

	!has_scheme_prefix(&path[1..])
}

/// Returns `candidate` when it is a safe redirect path, else `fallback`.
pub fn to_safe_redirect_path(candidate: Option<&str>, fallback: &str) -> String {
	match candidate {
		Some(path) if is_safe_redirect_path(path) => path.to_owned(),
		_ => fallback.to_owned(),
	}
}

/// Reads `key` from a query string (leading `?` optional) and validates it as a redirect path.
pub fn to_safe_next_path_from_query(query: &str, key: &str, fallback: &str) -> String {
	let raw = query.strip_prefix('?').unwrap_or(query);
	let candidate = url::form_urlencoded::parse(raw.as_bytes())
		.find(|(name, _)| name == key)
		.map(|(_, value)| value.into_owned());

	to_safe_redirect_path(candidate.as_deref(), fallback)
}

/// Validates an external redirect target against an origin allow-list.
///
/// Paths starting with `/` go through [`to_safe_redirect_path`]; absolute URLs are accepted
/// only when their origin is listed, and are returned in normalized form.
pub fn safe_external_redirect_url<S>(
	candidate: Option<&str>,
	allowed_origins: &[S],
	fallback: &str,
) -> String
where
	S: AsRef<str>,
{
	let Some(candidate) = candidate.filter(|value| !value.is_empty()) else {
		return fallback.to_owned();
	};

	if candidate.starts_with('/') {
		return to_safe_redirect_path(Some(candidate), fallback);
	}

	match Url::parse(candidate) {
		Ok(url) if allowed_origins.iter().any(|allowed| allowed.as_ref() == origin_of(&url)) =>
			url.to_string(),
		_ => fallback.to_owned(),
	}
}

// `scheme:` per RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":".
fn has_scheme_prefix(rest: &str) -> bool {
	let mut chars = rest.chars();

	if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
		return false;
	}

	for c in chars {
		match c {
			':' => return true,
			c if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') => continue,
			_ => return false,
		}
	}

	false
}
