//! `Cookie` parsing and hardened `Set-Cookie` construction.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::HTTP_DATE_FORMAT,
	security::sanitize::strip_control_chars,
};

/// Whether `name` is a non-empty RFC 6265 token.
pub fn is_valid_cookie_name(name: &str) -> bool {
	!name.is_empty()
		&& name.bytes().all(|b| {
			b.is_ascii_alphanumeric()
				|| matches!(
					b,
					b'!' | b'#'
						| b'$' | b'%' | b'&'
						| b'\'' | b'*' | b'+'
						| b'-' | b'.' | b'^'
						| b'_' | b'`' | b'|'
						| b'~'
				)
		})
}

/// Parses a `Cookie` header into a name/value map.
///
/// The first occurrence of a name wins, names outside the token alphabet are skipped, control
/// characters are stripped, and values are percent-decoded when valid (kept raw otherwise).
pub fn parse_cookie_header(header: Option<&str>) -> BTreeMap<String, String> {
	let mut cookies = BTreeMap::new();
	let Some(header) = header else { return cookies };

	for pair in header.split(';') {
		let Some((raw_name, raw_value)) = pair.split_once('=') else { continue };
		let name = strip_control_chars(raw_name).trim().to_owned();

		if !is_valid_cookie_name(&name) || cookies.contains_key(&name) {
			continue;
		}

		let value = strip_control_chars(raw_value);
		let value = value.trim();
		let decoded =
			urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_else(|_| value.to_owned());

		cookies.insert(name, decoded);
	}

	cookies
}

/// Returns the value of cookie `name`, if present.
pub fn get_cookie_value(header: Option<&str>, name: &str) -> Option<String> {
	parse_cookie_header(header).remove(name)
}

/// `SameSite` attribute values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
	/// Never sent cross-site.
	Strict,
	/// Sent on top-level navigations.
	#[default]
	Lax,
	/// Always sent; requires `Secure`.
	None,
}
impl SameSite {
	/// Attribute spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Strict => "Strict",
			Self::Lax => "Lax",
			Self::None => "None",
		}
	}
}
impl Display for SameSite {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Attributes for [`build_set_cookie_header`]. Defaults are `Path=/`, `HttpOnly`, `Secure`,
/// `SameSite=Lax`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookieOptions {
	/// `Path`; blank values fall back to `/`.
	pub path: Option<String>,
	/// `Domain`.
	pub domain: Option<String>,
	/// `Max-Age`; negative values clamp to zero.
	pub max_age: Option<Duration>,
	/// `Expires`.
	pub expires: Option<OffsetDateTime>,
	/// Emit `HttpOnly`.
	pub http_only: bool,
	/// Emit `Secure`.
	pub secure: bool,
	/// `SameSite`.
	pub same_site: SameSite,
}
impl SetCookieOptions {
	/// Sets `Path`.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());

		self
	}

	/// Sets `Domain`.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Sets `Max-Age`.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = Some(max_age);

		self
	}

	/// Sets `Expires`.
	pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
		self.expires = Some(expires);

		self
	}

	/// Toggles `HttpOnly`.
	pub fn with_http_only(mut self, http_only: bool) -> Self {
		self.http_only = http_only;

		self
	}

	/// Toggles `Secure`.
	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;

		self
	}

	/// Sets `SameSite`.
	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = same_site;

		self
	}
}
impl Default for SetCookieOptions {
	fn default() -> Self {
		Self {
			path: None,
			domain: None,
			max_age: None,
			expires: None,
			http_only: true,
			secure: true,
			same_site: SameSite::Lax,
		}
	}
}

/// Builds a `Set-Cookie` value with hardened defaults.
///
/// Fails for names outside the token alphabet and for `SameSite=None` without `Secure`. The
/// value is percent-encoded so it cannot break out of the attribute list.
pub fn build_set_cookie_header(
	name: &str,
	value: &str,
	options: &SetCookieOptions,
) -> Result<String, ConfigError> {
	let name = strip_control_chars(name);
	let name = name.trim();

	if !is_valid_cookie_name(name) {
		return Err(ConfigError::InvalidCookieName { name: name.to_owned() });
	}
	if options.same_site == SameSite::None && !options.secure {
		return Err(ConfigError::InsecureSameSiteNone);
	}

	let path = options.path.as_deref().map(str::trim).filter(|path| !path.is_empty()).unwrap_or("/");
	let mut segments = vec![
		format!("{name}={}", urlencoding::encode(&strip_control_chars(value))),
		format!("Path={}", strip_control_chars(path)),
		format!("SameSite={}", options.same_site),
	];

	if let Some(domain) = &options.domain {
		segments.push(format!("Domain={}", strip_control_chars(domain).trim()));
	}
	if let Some(max_age) = options.max_age {
		segments.push(format!("Max-Age={}", max_age.whole_seconds().max(0)));
	}
	// The layout has no optional components, so formatting a UTC instant cannot fail.
	let expires = options
		.expires
		.and_then(|at| at.to_offset(time::UtcOffset::UTC).format(HTTP_DATE_FORMAT).ok());

	if let Some(expires) = expires {
		segments.push(format!("Expires={expires}"));
	}
	if options.http_only {
		segments.push("HttpOnly".into());
	}
	if options.secure {
		segments.push("Secure".into());
	}

	Ok(segments.join("; "))
}
