//! Per-call request options.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	client::RetryOverrides,
	http::{Headers, HttpMethod},
};

/// Caller context forwarded in `X-Request-Context` for log correlation.
///
/// Never used for authorization decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestContext {
	/// Screen or route issuing the call.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page: Option<String>,
	/// User action that triggered the call.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub action: Option<String>,
}
impl RequestContext {
	/// Context for `page`.
	pub fn page(page: impl Into<String>) -> Self {
		Self { page: Some(page.into()), action: None }
	}

	/// Sets the action.
	pub fn with_action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());

		self
	}

	/// JSON form with unset fields omitted.
	pub fn to_value(&self) -> Value {
		let mut map = serde_json::Map::new();

		if let Some(page) = &self.page {
			map.insert("page".into(), Value::String(page.clone()));
		}
		if let Some(action) = &self.action {
			map.insert("action".into(), Value::String(action.clone()));
		}

		Value::Object(map)
	}
}

/// Per-call options for [`Client::request`](crate::client::Client::request).
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Request method (default `GET`).
	pub method: HttpMethod,
	/// Extra headers; values are sanitized before sending.
	pub headers: Headers,
	/// Query parameters in insertion order.
	pub query: Vec<(String, String)>,
	/// JSON body.
	pub body: Option<Value>,
	/// Caller-owned cancellation; when set, the internal timeout is not armed.
	pub signal: Option<CancellationToken>,
	/// Per-send timeout override.
	pub timeout: Option<Duration>,
	/// Retry policy overrides.
	pub retry: RetryOverrides,
	/// Log correlation context.
	pub context: Option<RequestContext>,
	/// Attach a bearer token (default true).
	pub with_auth: Option<bool>,
	/// Attach a CSRF token (default: every method except `GET`).
	pub with_csrf: Option<bool>,
}
impl RequestOptions {
	/// Options for `method`.
	pub fn new(method: HttpMethod) -> Self {
		Self { method, ..Default::default() }
	}

	/// `GET` options.
	pub fn get() -> Self {
		Self::new(HttpMethod::Get)
	}

	/// `POST` options with a JSON body.
	pub fn post(body: Value) -> Self {
		Self::new(HttpMethod::Post).with_body(body)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a scalar query parameter, replacing earlier values for `key`.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		let key = key.into();

		self.query.retain(|(existing, _)| *existing != key);
		self.query.push((key, value.to_string()));

		self
	}

	/// Appends one entry per item for `key`; an empty iterator adds nothing.
	pub fn with_query_values<I, V>(mut self, key: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Display,
	{
		let key = key.into();

		for value in values {
			self.query.push((key.clone(), value.to_string()));
		}

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Ties the call to a caller-owned cancellation token.
	pub fn with_signal(mut self, signal: CancellationToken) -> Self {
		self.signal = Some(signal);

		self
	}

	/// Overrides the per-send timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Overrides retry settings for this call.
	pub fn with_retry(mut self, retry: RetryOverrides) -> Self {
		self.retry = retry;

		self
	}

	/// Attaches log correlation context.
	pub fn with_context(mut self, context: RequestContext) -> Self {
		self.context = Some(context);

		self
	}

	/// Toggles the bearer token.
	pub fn with_auth(mut self, with_auth: bool) -> Self {
		self.with_auth = Some(with_auth);

		self
	}

	/// Toggles the CSRF token.
	pub fn with_csrf(mut self, with_csrf: bool) -> Self {
		self.with_csrf = Some(with_csrf);

		self
	}

	pub(crate) fn auth_enabled(&self) -> bool {
		self.with_auth.unwrap_or(true)
	}

	pub(crate) fn csrf_enabled(&self) -> bool {
		self.with_csrf.unwrap_or(self.method != HttpMethod::Get)
	}
}

/// Successful response.
#[derive(Clone, Debug)]
pub struct ApiResponse<T> {
	/// Decoded body; `{}` for empty bodies.
	pub data: T,
	/// HTTP status.
	pub status: u16,
	/// Response headers.
	pub headers: Headers,
}
impl<T> ApiResponse<T> {
	/// Maps the payload while keeping status and headers.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
		ApiResponse { data: f(self.data), status: self.status, headers: self.headers }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn csrf_defaults_follow_the_method() {
		assert!(!RequestOptions::get().csrf_enabled());
		assert!(RequestOptions::post(Value::Null).csrf_enabled());
		assert!(!RequestOptions::new(HttpMethod::Delete).with_csrf(false).csrf_enabled());
		assert!(RequestOptions::get().auth_enabled());
		assert!(!RequestOptions::get().with_auth(false).auth_enabled());
	}

	#[test]
	fn scalar_query_replaces_and_arrays_append() {
		let options = RequestOptions::get()
			.with_query("page", 1)
			.with_query_values("tag", ["a", "b"])
			.with_query("page", 2)
			.with_query_values("empty", Vec::<String>::new());

		assert_eq!(options.query, vec![
			("tag".to_owned(), "a".to_owned()),
			("tag".to_owned(), "b".to_owned()),
			("page".to_owned(), "2".to_owned()),
		]);
	}

	#[test]
	fn context_omits_unset_fields() {
		assert_eq!(
			RequestContext::page("users").to_value(),
			serde_json::json!({ "page": "users" })
		);
		assert_eq!(
			RequestContext::page("users").with_action("delete").to_value(),
			serde_json::json!({ "page": "users", "action": "delete" })
		);
		assert_eq!(RequestContext::default().to_value(), serde_json::json!({}));
	}
}
