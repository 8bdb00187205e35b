//! Double-submit CSRF tokens: issuance, format checks, and constant-time verification.
//!
//! The server sets the token in a cookie and returns it in the body; the client echoes it in
//! `X-CSRF-Token`. A request is genuine when cookie and header carry the same well-formed
//! token.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	security::{
		cookie::{SameSite, SetCookieOptions, build_set_cookie_header},
		sanitize::strip_control_chars,
	},
};

/// Minimum accepted token length.
pub const MIN_CSRF_TOKEN_LENGTH: usize = 16;
/// Cookie carrying the server's copy of the token.
pub const CSRF_COOKIE_NAME: &str = "csrf_token";
/// Header carrying the client's copy of the token.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

const MIN_TOKEN_BYTES: usize = 16;

/// Generates `byte_len` random bytes (at least 16) encoded as unpadded base64url.
pub fn create_secure_token(byte_len: usize) -> String {
	let mut bytes = vec![0_u8; byte_len.max(MIN_TOKEN_BYTES)];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

/// Compares two strings without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
	let shared = a.len().min(b.len());
	let content_equal = a[..shared].ct_eq(&b[..shared]);

	(lengths_equal & content_equal).into()
}

/// Constant-time comparison that also requires both values to be at least `min_len` bytes.
pub fn secure_compare_token(expected: &str, actual: &str, min_len: usize) -> bool {
	let long_enough = expected.len() >= min_len && actual.len() >= min_len;

	long_enough && constant_time_eq(expected, actual)
}

/// Whether `token`, after stripping control characters and trimming, is at least `min_len`
/// characters of the base64url alphabet.
pub fn is_valid_csrf_token_format(token: &str, min_len: usize) -> bool {
	let normalized = strip_control_chars(token);
	let normalized = normalized.trim();

	normalized.len() >= min_len
		&& normalized.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Double-submit check: true iff both tokens are present, well-formed, and byte-equal.
pub fn verify_csrf_double_submit(
	cookie_token: Option<&str>,
	header_token: Option<&str>,
	min_len: usize,
) -> bool {
	let (Some(cookie_token), Some(header_token)) = (cookie_token, header_token) else {
		return false;
	};
	let cookie_token = strip_control_chars(cookie_token);
	let header_token = strip_control_chars(header_token);
	let (cookie_token, header_token) = (cookie_token.trim(), header_token.trim());

	if !is_valid_csrf_token_format(cookie_token, min_len)
		|| !is_valid_csrf_token_format(header_token, min_len)
	{
		return false;
	}

	secure_compare_token(cookie_token, header_token, min_len)
}

/// Settings for [`issue_csrf_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfCookieOptions {
	/// Cookie name.
	pub cookie_name: String,
	/// Random bytes per token.
	pub token_bytes: usize,
	/// Cookie lifetime.
	pub max_age: Duration,
	/// Emit the `Secure` attribute (production).
	pub secure: bool,
}
impl CsrfCookieOptions {
	/// Sets whether the cookie requires HTTPS.
	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;

		self
	}

	/// Overrides the cookie lifetime.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;

		self
	}
}
impl Default for CsrfCookieOptions {
	fn default() -> Self {
		Self {
			cookie_name: CSRF_COOKIE_NAME.into(),
			token_bytes: 24,
			max_age: Duration::hours(1),
			secure: true,
		}
	}
}

/// Freshly issued token plus the `Set-Cookie` value that plants it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedCsrfToken {
	/// Value returned to the client as `{"csrfToken": ...}`.
	pub token: String,
	/// `Set-Cookie` header value.
	pub set_cookie: String,
}
impl IssuedCsrfToken {
	/// JSON body for the token endpoint.
	pub fn body(&self) -> Value {
		serde_json::json!({ "csrfToken": self.token })
	}
}

/// Issues a token and its HttpOnly, `SameSite=Lax`, `Path=/` cookie.
pub fn issue_csrf_token(options: &CsrfCookieOptions) -> Result<IssuedCsrfToken, ConfigError> {
	let token = create_secure_token(options.token_bytes);
	let cookie = SetCookieOptions::default()
		.with_path("/")
		.with_http_only(true)
		.with_secure(options.secure)
		.with_same_site(SameSite::Lax)
		.with_max_age(options.max_age);
	let set_cookie = build_set_cookie_header(&options.cookie_name, &token, &cookie)?;

	Ok(IssuedCsrfToken { token, set_cookie })
}
