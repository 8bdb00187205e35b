//! Normalized error taxonomy shared by the executor, the retry loop, and callers.
//!
//! Every request failure surfaces as an [`ApiError`] carrying a closed [`ErrorCode`], so
//! presentation layers only need to switch on the code. Construction-time problems use
//! [`ConfigError`], and raw transport failures ([`TransportError`]) never leave the executor.

// self
use crate::{
	_prelude::*,
	http::{HttpResponse, parse_retry_after_ms},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Default message used when neither the caller nor the server supplies one.
pub const DEFAULT_ERROR_MESSAGE: &str = "API request failed";

/// Canonical crate error exposed by APIs that can fail for more than one reason.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Normalized request failure.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns the wrapped [`ApiError`], if any.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(err) => Some(err),
			Self::Config(_) => None,
		}
	}
}

/// Closed set of error codes every [`ApiError`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Transport failed before an HTTP response was received.
	NetworkError,
	/// HTTP 401.
	AuthError,
	/// HTTP 403.
	Forbidden,
	/// HTTP 404.
	NotFound,
	/// HTTP 400, unparsable JSON, or a response that does not match the expected shape.
	ValidationError,
	/// HTTP 422.
	BusinessError,
	/// HTTP 429.
	RateLimited,
	/// HTTP 5xx.
	ServerError,
	/// Request aborted by timeout or cancellation, or HTTP 408.
	TimeoutError,
	/// Any other status.
	UnknownError,
}
impl ErrorCode {
	/// Returns the stable wire label (e.g. `RATE_LIMITED`).
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NetworkError => "NETWORK_ERROR",
			Self::AuthError => "AUTH_ERROR",
			Self::Forbidden => "FORBIDDEN",
			Self::NotFound => "NOT_FOUND",
			Self::ValidationError => "VALIDATION_ERROR",
			Self::BusinessError => "BUSINESS_ERROR",
			Self::RateLimited => "RATE_LIMITED",
			Self::ServerError => "SERVER_ERROR",
			Self::TimeoutError => "TIMEOUT_ERROR",
			Self::UnknownError => "UNKNOWN_ERROR",
		}
	}

	/// Codes that are retried regardless of the retryable-status set.
	pub const fn is_transport_level(self) -> bool {
		matches!(self, Self::NetworkError | Self::TimeoutError)
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps an HTTP status onto the error taxonomy. Total over all `u16` values.
pub fn map_status_to_code(status: u16) -> ErrorCode {
	match status {
		400 => ErrorCode::ValidationError,
		401 => ErrorCode::AuthError,
		403 => ErrorCode::Forbidden,
		404 => ErrorCode::NotFound,
		408 => ErrorCode::TimeoutError,
		422 => ErrorCode::BusinessError,
		429 => ErrorCode::RateLimited,
		500.. => ErrorCode::ServerError,
		_ => ErrorCode::UnknownError,
	}
}

/// Which validation stage rejected a successful response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
	/// The body was not valid JSON.
	ResponseParse,
	/// The JSON did not match the expected type.
	SchemaMismatch,
}

/// Parameters accepted by [`ApiError::new`].
///
/// Additional fields may be added in future releases, so construct values with
/// `ApiErrorParams::new(..)` plus the `with_*` helpers instead of struct literals.
#[derive(Clone, Debug)]
pub struct ApiErrorParams {
	/// Error code.
	pub code: ErrorCode,
	/// Human-readable message; defaults to [`DEFAULT_ERROR_MESSAGE`].
	pub message: Option<String>,
	/// HTTP status, when a response was received.
	pub status: Option<u16>,
	/// Whether the failure may succeed on retry.
	pub retryable: bool,
	/// Server-advised delay before retrying.
	pub retry_after_ms: Option<u64>,
	/// Field-level validation messages.
	pub field_errors: Option<BTreeMap<String, Vec<String>>>,
	/// Raw detail payload (usually the parsed error body).
	pub detail: Option<Value>,
	/// Validation stage that produced the error.
	pub cause: Option<ErrorCause>,
}
impl ApiErrorParams {
	/// Starts a parameter set for the given code and retryability.
	pub fn new(code: ErrorCode, retryable: bool) -> Self {
		Self {
			code,
			message: None,
			status: None,
			retryable,
			retry_after_ms: None,
			field_errors: None,
			detail: None,
			cause: None,
		}
	}

	/// Sets the message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Sets the HTTP status.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Sets the retry hint in milliseconds.
	pub fn with_retry_after_ms(mut self, retry_after_ms: Option<u64>) -> Self {
		self.retry_after_ms = retry_after_ms;

		self
	}

	/// Sets field-level validation messages.
	pub fn with_field_errors(mut self, field_errors: Option<BTreeMap<String, Vec<String>>>) -> Self {
		self.field_errors = field_errors;

		self
	}

	/// Sets the detail payload.
	pub fn with_detail(mut self, detail: Option<Value>) -> Self {
		self.detail = detail;

		self
	}

	/// Sets the validation cause.
	pub fn with_cause(mut self, cause: ErrorCause) -> Self {
		self.cause = Some(cause);

		self
	}
}

/// Normalized request failure.
///
/// Fields are fixed at construction: retryability is decided once by the constructor and
/// cannot be flipped later by downstream code.
#[derive(Clone, Debug, PartialEq, Serialize, ThisError)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct ApiError {
	code: ErrorCode,
	message: String,
	#[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
	status: Option<u16>,
	retryable: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	retry_after_ms: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	field_errors: Option<BTreeMap<String, Vec<String>>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	detail: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	cause: Option<ErrorCause>,
}
impl ApiError {
	/// Builds an error from the provided parameters. Never fails.
	pub fn new(params: ApiErrorParams) -> Self {
		let message = params
			.message
			.filter(|message| !message.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.into());

		Self {
			code: params.code,
			message,
			status: params.status,
			retryable: params.retryable,
			retry_after_ms: params.retry_after_ms,
			field_errors: params.field_errors.filter(|map| !map.is_empty()),
			detail: params.detail,
			cause: params.cause,
		}
	}

	/// Transport-level failure (connection refused, reset, DNS, TLS). Always retryable.
	pub fn network() -> Self {
		Self::new(ApiErrorParams::new(ErrorCode::NetworkError, true).with_message("Network error"))
	}

	/// Request aborted by timeout or caller cancellation. Always retryable.
	pub fn timeout() -> Self {
		Self::new(ApiErrorParams::new(ErrorCode::TimeoutError, true).with_message("Request timeout"))
	}

	/// Successful response whose body is not valid JSON. Never retryable.
	pub fn response_parse(reason: impl Display) -> Self {
		Self::new(
			ApiErrorParams::new(ErrorCode::ValidationError, false)
				.with_message("Response JSON parse failed")
				.with_detail(Some(serde_json::json!({ "cause": reason.to_string() })))
				.with_cause(ErrorCause::ResponseParse),
		)
	}

	/// Successful response whose JSON does not match the expected type. Never retryable.
	pub fn schema_mismatch(path: impl Display, reason: impl Display) -> Self {
		Self::new(
			ApiErrorParams::new(ErrorCode::ValidationError, false)
				.with_message("Response validation failed")
				.with_detail(Some(serde_json::json!({
					"path": path.to_string(),
					"cause": reason.to_string(),
				})))
				.with_cause(ErrorCause::SchemaMismatch),
		)
	}

	/// Classifies a non-2xx response.
	///
	/// The code comes from the status, and retryability from membership in
	/// `retryable_statuses`. `Retry-After` is only honored for 429. The parsed body is kept as
	/// `detail`, its `fieldErrors` object feeds the field errors, and its `message` wins over the
	/// canonical reason phrase.
	pub fn from_response(response: &HttpResponse, retryable_statuses: &[u16]) -> Self {
		let status = response.status;
		let detail = serde_json::from_slice::<Value>(&response.body).ok();
		let retry_after_ms = if status == 429 {
			response
				.headers
				.get("retry-after")
				.and_then(|raw| parse_retry_after_ms(raw, OffsetDateTime::now_utc()))
		} else {
			None
		};
		let message = detail
			.as_ref()
			.and_then(|body| body.get("message"))
			.and_then(Value::as_str)
			.map(str::to_owned)
			.or_else(|| canonical_reason(status).map(str::to_owned));
		let mut params = ApiErrorParams::new(
			map_status_to_code(status),
			retryable_statuses.contains(&status),
		)
		.with_status(status)
		.with_retry_after_ms(retry_after_ms)
		.with_field_errors(detail.as_ref().and_then(field_errors_of));

		if let Some(message) = message {
			params = params.with_message(message);
		}

		Self::new(params.with_detail(detail))
	}

	/// Normalized code.
	pub fn code(&self) -> ErrorCode {
		self.code
	}

	/// Human-readable message.
	pub fn message(&self) -> &str {
		&self.message
	}

	/// HTTP status, when a response was received.
	pub fn status(&self) -> Option<u16> {
		self.status
	}

	/// Whether the failure may succeed on retry.
	pub fn is_retryable(&self) -> bool {
		self.retryable
	}

	/// Server-advised delay before retrying, in milliseconds (429 only).
	pub fn retry_after_ms(&self) -> Option<u64> {
		self.retry_after_ms
	}

	/// Field-level validation messages.
	pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
		self.field_errors.as_ref()
	}

	/// Raw detail payload.
	pub fn detail(&self) -> Option<&Value> {
		self.detail.as_ref()
	}

	/// Validation stage that produced the error, if any.
	pub fn cause(&self) -> Option<ErrorCause> {
		self.cause
	}
}

fn field_errors_of(body: &Value) -> Option<BTreeMap<String, Vec<String>>> {
	let fields = body.get("fieldErrors")?.as_object()?;
	let collected = fields
		.iter()
		.filter_map(|(field, messages)| {
			let messages = messages
				.as_array()?
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_owned)
				.collect::<Vec<_>>();

			(!messages.is_empty()).then(|| (field.clone(), messages))
		})
		.collect::<BTreeMap<_, _>>();

	(!collected.is_empty()).then_some(collected)
}

fn canonical_reason(status: u16) -> Option<&'static str> {
	Some(match status {
		400 => "Bad Request",
		401 => "Unauthorized",
		403 => "Forbidden",
		404 => "Not Found",
		405 => "Method Not Allowed",
		408 => "Request Timeout",
		409 => "Conflict",
		410 => "Gone",
		413 => "Payload Too Large",
		415 => "Unsupported Media Type",
		422 => "Unprocessable Entity",
		429 => "Too Many Requests",
		500 => "Internal Server Error",
		501 => "Not Implemented",
		502 => "Bad Gateway",
		503 => "Service Unavailable",
		504 => "Gateway Timeout",
		_ => return None,
	})
}

/// Returns `true` when `err` is an [`ApiError`], directly or wrapped in [`Error::Api`].
///
/// Discrimination is by concrete type, so generic errors whose message happens to look like
/// an API failure never match.
pub fn is_api_error(err: &(dyn StdError + 'static)) -> bool {
	if err.is::<ApiError>() {
		return true;
	}

	matches!(err.downcast_ref::<Error>(), Some(Error::Api(_)))
}

/// Configuration and validation failures raised while building clients or headers.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Retry configuration requests zero attempts.
	#[error("Retry configuration must allow at least one attempt.")]
	ZeroAttempts,
	/// A duration setting is negative or zero where a positive value is required.
	#[error("The {setting} setting must be positive.")]
	NonPositiveDuration {
		/// Setting name.
		setting: &'static str,
	},
	/// Endpoint path does not start with `/`.
	#[error("Endpoint path `{path}` must start with `/`.")]
	InvalidEndpointPath {
		/// Offending path.
		path: String,
	},
	/// Cookie name contains characters outside the RFC 6265 token set.
	#[error("Cookie name `{name}` is invalid.")]
	InvalidCookieName {
		/// Offending name (control characters stripped).
		name: String,
	},
	/// `SameSite=None` was requested without `Secure`.
	#[error("SameSite=None requires Secure=true.")]
	InsecureSameSiteNone,
	/// Redaction pattern cannot be compiled.
	#[error("Sensitive key pattern is invalid.")]
	InvalidPattern(#[from] regex::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, transport-enforced timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client gave up waiting for the server.
	#[error("Transport timed out while sending the request.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Failures raised by [`crate::security::safe_json_parse_with_schema`].
#[derive(Debug, ThisError)]
pub enum JsonInputError {
	/// Input is not JSON at all.
	#[error("Input is not valid JSON.")]
	Syntax(#[source] serde_json::Error),
	/// Input is JSON but does not match the expected shape.
	#[error("Schema validation failed at `{path}`.")]
	Schema {
		/// Path of the first mismatching value.
		path: String,
		/// Underlying deserialization failure.
		#[source]
		source: serde_json::Error,
	},
}
impl From<TransportError> for ApiError {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Timeout => Self::timeout(),
			TransportError::Network { .. } | TransportError::Io(_) => Self::network(),
		}
	}
}
