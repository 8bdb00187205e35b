//! Origin and Referer allow-list checks for state-changing requests.

// self
use crate::{_prelude::*, http::Headers};

/// How to treat requests without a usable `Origin` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OriginPolicy {
	/// Accept requests carrying neither `Origin` nor a usable `Referer`.
	pub allow_missing_origin: bool,
	/// Fall back to the `Referer` origin when `Origin` is absent.
	pub allow_referer_fallback: bool,
}
impl Default for OriginPolicy {
	fn default() -> Self {
		Self { allow_missing_origin: false, allow_referer_fallback: true }
	}
}

/// Serialized origin (`scheme://host[:port]`) of `url`; opaque origins serialize as `null`.
pub fn origin_of(url: &Url) -> String {
	url.origin().ascii_serialization()
}

/// Whether the origin of `url` is listed in `allowed`. Unparsable URLs are rejected.
pub fn is_allowed_origin<S>(url: &str, allowed: &[S]) -> bool
where
	S: AsRef<str>,
{
	let Ok(parsed) = Url::parse(url) else { return false };
	let origin = origin_of(&parsed);

	allowed.iter().any(|candidate| candidate.as_ref() == origin)
}

/// Checks a request's `Origin` (or `Referer`, per `policy`) against `allowed`.
///
/// An empty allow-list accepts everything.
pub fn validate_request_origin<S>(headers: &Headers, allowed: &[S], policy: OriginPolicy) -> bool
where
	S: AsRef<str>,
{
	if allowed.is_empty() {
		return true;
	}
	if let Some(origin) = headers.get("origin").filter(|value| !value.is_empty()) {
		return allowed.iter().any(|candidate| candidate.as_ref() == origin);
	}
	let referer = headers.get("referer").filter(|value| !value.is_empty());

	match referer {
		Some(referer) if policy.allow_referer_fallback => is_allowed_origin(referer, allowed),
		_ => policy.allow_missing_origin,
	}
}
