//! Transport primitives for the request executor.
//!
//! The module exposes [`HttpTransport`] alongside the crate-owned [`HttpRequest`] and
//! [`HttpResponse`] types so downstream crates can plug in custom HTTP stacks without
//! touching the executor. Implementations only move bytes: status classification, retry
//! decisions, timeouts, and header sanitization all stay in the client.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::{
	Method as ReqwestMethod,
	header::{HeaderMap, HeaderName, HeaderValue},
	redirect::Policy,
};
use time::{
	PrimitiveDateTime, format_description::well_known::Rfc2822, macros::format_description,
};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// IMF-fixdate layout used by `Retry-After`, `Expires`, and other HTTP date headers.
pub const HTTP_DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Abstraction over HTTP stacks capable of executing one request.
///
/// The trait is the client's only dependency on a network stack. Implementations must be
/// `Send + Sync + 'static` so one instance can be shared behind an `Arc` by every clone of a
/// client, and the returned future must be `Send` so calls can hop executors.
///
/// Implementations should:
/// - Send the request exactly once (no internal retries, no redirect following).
/// - Read the full response body before resolving.
/// - Report connection-level failures as [`TransportError`]; HTTP error statuses are ordinary
///   responses.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the complete response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// HTTP methods issued by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// `GET`.
	#[default]
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
}
impl HttpMethod {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
#[cfg(feature = "reqwest")]
impl From<HttpMethod> for ReqwestMethod {
	fn from(method: HttpMethod) -> Self {
		match method {
			HttpMethod::Get => Self::GET,
			HttpMethod::Post => Self::POST,
			HttpMethod::Put => Self::PUT,
			HttpMethod::Patch => Self::PATCH,
			HttpMethod::Delete => Self::DELETE,
		}
	}
}

/// Case-insensitive header map. Names are stored lowercased; a later insert replaces an
/// earlier value for the same name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(BTreeMap<String, String>);
impl Headers {
	/// Creates an empty header map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.insert(name, value);

		self
	}

	/// Inserts or replaces `name`.
	pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
		self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Returns the value stored under `name`, ignoring case.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Removes `name`, returning the previous value.
	pub fn remove(&mut self, name: &str) -> Option<String> {
		self.0.remove(&name.to_ascii_lowercase())
	}

	/// Whether `name` is present.
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(&name.to_ascii_lowercase())
	}

	/// Iterates `(lowercased-name, value)` pairs in name order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Number of distinct header names.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the map is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<K, V> FromIterator<(K, V)> for Headers
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut headers = Self::new();

		for (name, value) in iter {
			headers.insert(name, value);
		}

		headers
	}
}
#[cfg(feature = "reqwest")]
impl From<&HeaderMap> for Headers {
	fn from(map: &HeaderMap) -> Self {
		let mut headers = Self::new();

		for (name, value) in map {
			let Ok(value) = value.to_str() else { continue };

			match headers.0.get_mut(name.as_str()) {
				// Repeated headers fold into one comma-separated value.
				Some(existing) => {
					existing.push_str(", ");
					existing.push_str(value);
				},
				None => headers.insert(name.as_str(), value),
			}
		}

		headers
	}
}

/// Outbound request handed to an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Request method.
	pub method: HttpMethod,
	/// Absolute request URL including the query string.
	pub url: Url,
	/// Request headers (already sanitized by the client).
	pub headers: Headers,
	/// Serialized request body.
	pub body: Option<Vec<u8>>,
}
impl HttpRequest {
	/// Creates a body-less request.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self { method, url, headers: Headers::new(), body: None }
	}

	/// Attaches a serialized body.
	pub fn with_body(mut self, body: Vec<u8>) -> Self {
		self.body = Some(body);

		self
	}

	/// Replaces the header map.
	pub fn with_headers(mut self, headers: Headers) -> Self {
		self.headers = headers;

		self
	}

	/// Parses the body as JSON, for transports and tests that inspect payloads.
	pub fn json_body(&self) -> Option<Value> {
		self.body.as_deref().and_then(|body| serde_json::from_slice(body).ok())
	}
}

/// Complete response returned by an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Status code.
	pub status: u16,
	/// Response headers.
	pub headers: Headers,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// Whether the status is in `200..=299`.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// [`HttpTransport`] backed by [`ReqwestClient`].
///
/// The default client keeps a cookie store (so HttpOnly refresh and CSRF cookies travel with
/// every call) and never follows redirects, because a redirected API call would hide the
/// status the executor needs to classify.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds the default cookie-aware, non-redirecting client.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().cookie_store(true).redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest client. Configure it to disable redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut header_map = HeaderMap::new();

			for (name, value) in request.headers.iter() {
				let name = HeaderName::from_bytes(name.as_bytes()).map_err(TransportError::network)?;
				let value = HeaderValue::from_str(value).map_err(TransportError::network)?;

				header_map.insert(name, value);
			}

			let mut builder =
				client.request(request.method.into(), request.url).headers(header_map);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = Headers::from(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse::new(status, headers, body))
		})
	}
}

/// Parses a `Retry-After` value into milliseconds relative to `now`.
///
/// Accepts non-negative integer or decimal seconds and HTTP dates (RFC 2822 or IMF-fixdate).
/// Dates in the past, negative numbers, and garbage yield `None`.
pub fn parse_retry_after_ms(raw: &str, now: OffsetDateTime) -> Option<u64> {
	let raw = raw.trim();

	if raw.is_empty() {
		return None;
	}
	if let Ok(secs) = raw.parse::<f64>() {
		if secs.is_finite() && secs >= 0. {
			return Some((secs * 1_000.).round() as u64);
		}

		return None;
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822)
		.ok()
		.or_else(|| PrimitiveDateTime::parse(raw, HTTP_DATE_FORMAT).ok().map(|dt| dt.assume_utc()))?;
	let delta = moment - now;

	if delta.is_positive() { u64::try_from(delta.whole_milliseconds()).ok() } else { None }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn headers_are_case_insensitive() {
		let headers = Headers::new().with("X-CSRF-Token", "abc").with("content-type", "text/plain");

		assert_eq!(headers.get("x-csrf-token"), Some("abc"));
		assert_eq!(headers.get("Content-Type"), Some("text/plain"));
		assert!(headers.contains("X-Csrf-Token"));

		let names = headers.iter().map(|(name, _)| name).collect::<Vec<_>>();

		assert_eq!(names, ["content-type", "x-csrf-token"]);
	}

	#[test]
	fn retry_after_accepts_seconds() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(parse_retry_after_ms("60", now), Some(60_000));
		assert_eq!(parse_retry_after_ms(" 1.5 ", now), Some(1_500));
		assert_eq!(parse_retry_after_ms("0", now), Some(0));
		assert_eq!(parse_retry_after_ms("-3", now), None);
		assert_eq!(parse_retry_after_ms("", now), None);
		assert_eq!(parse_retry_after_ms("soon", now), None);
	}

	#[test]
	fn retry_after_accepts_http_dates() {
		let now = datetime!(2015-10-21 07:27:00 UTC);

		assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:28:00 GMT", now), Some(60_000));
		assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:26:00 GMT", now), None);
	}

	#[test]
	fn method_labels_are_uppercase() {
		assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
		assert_eq!(
			serde_json::to_string(&HttpMethod::Delete).expect("Method should serialize."),
			"\"DELETE\""
		);
	}
}
