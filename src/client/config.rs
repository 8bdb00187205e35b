//! Client configuration types.

// self
use crate::{
	_prelude::*,
	auth::DEFAULT_EXPIRY_MARGIN,
	client::RetryConfig,
	csrf::DEFAULT_CSRF_TTL,
	error::ConfigError,
	security::DEFAULT_HEADER_VALUE_MAX,
};

/// Default per-send timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(15);
/// Default CSRF token endpoint, relative to the base URL.
pub const DEFAULT_CSRF_PATH: &str = "/csrf-token";
/// Default refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
/// Mock scenario names longer than this are cut.
pub const MAX_MOCK_SCENARIO_LENGTH: usize = 64;

/// Validated client settings.
///
/// Use [`ClientConfig::builder`] for programmatic construction. Values deserialized from a
/// host-provided file should go through [`ClientConfig::validate`] before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// API base URL; endpoint paths are appended to it.
	pub base_url: Url,
	/// Timeout armed for every send unless the caller supplies a cancellation token.
	pub timeout: Duration,
	/// Default retry policy.
	pub retry: RetryConfig,
	/// CSRF token cache lifetime.
	pub csrf_ttl: Duration,
	/// Margin before `exp` at which access tokens are refreshed proactively.
	pub expiry_margin: Duration,
	/// CSRF token endpoint path.
	pub csrf_path: String,
	/// Refresh endpoint path.
	pub refresh_path: String,
	/// Character cap applied to caller-supplied header values.
	pub header_value_max: usize,
	/// Value forwarded as `x-mock-scenario`; `"default"` disables the header.
	pub mock_scenario: Option<String>,
}
impl ClientConfig {
	/// Starts a builder for `base_url`.
	pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Checks invariants that deserialization cannot enforce.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let scheme = self.base_url.scheme();

		if scheme != "http" && scheme != "https" {
			return Err(ConfigError::UnsupportedScheme { scheme: scheme.to_owned() });
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}

		for (setting, value) in [
			("timeout", self.timeout),
			("csrf_ttl", self.csrf_ttl),
			("expiry_margin", self.expiry_margin),
		] {
			if !value.is_positive() {
				return Err(ConfigError::NonPositiveDuration { setting });
			}
		}
		for path in [&self.csrf_path, &self.refresh_path] {
			if !path.starts_with('/') {
				return Err(ConfigError::InvalidEndpointPath { path: path.clone() });
			}
		}

		Ok(())
	}

	/// Resolves `path` against the base URL, keeping the base path prefix.
	pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');

		Url::parse(&format!("{base}/{path}"))
	}

	/// Mock scenario to forward, if any.
	pub fn active_mock_scenario(&self) -> Option<&str> {
		self.mock_scenario.as_deref().filter(|scenario| !scenario.is_empty() && *scenario != "default")
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	timeout: Duration,
	retry: RetryConfig,
	csrf_ttl: Duration,
	expiry_margin: Duration,
	csrf_path: String,
	refresh_path: String,
	header_value_max: usize,
	mock_scenario: Option<String>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			timeout: DEFAULT_REQUEST_TIMEOUT,
			retry: RetryConfig::default(),
			csrf_ttl: DEFAULT_CSRF_TTL,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
			csrf_path: DEFAULT_CSRF_PATH.into(),
			refresh_path: DEFAULT_REFRESH_PATH.into(),
			header_value_max: DEFAULT_HEADER_VALUE_MAX,
			mock_scenario: None,
		}
	}

	/// Overrides the per-send timeout (default 15 seconds).
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the default retry policy.
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the CSRF cache lifetime (default 55 minutes).
	pub fn with_csrf_ttl(mut self, ttl: Duration) -> Self {
		self.csrf_ttl = ttl;

		self
	}

	/// Overrides the proactive refresh margin (default 5 minutes).
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = margin;

		self
	}

	/// Overrides the CSRF endpoint path.
	pub fn with_csrf_path(mut self, path: impl Into<String>) -> Self {
		self.csrf_path = path.into();

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the header value cap (default 256 characters).
	pub fn with_header_value_max(mut self, max: usize) -> Self {
		self.header_value_max = max;

		self
	}

	/// Forwards `scenario` as `x-mock-scenario` on every request.
	pub fn with_mock_scenario(mut self, scenario: impl Into<String>) -> Self {
		self.mock_scenario = Some(scenario.into());

		self
	}

	/// Parses the base URL and validates every setting.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url =
			Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let config = ClientConfig {
			base_url,
			timeout: self.timeout,
			retry: self.retry,
			csrf_ttl: self.csrf_ttl,
			expiry_margin: self.expiry_margin,
			csrf_path: self.csrf_path,
			refresh_path: self.refresh_path,
			header_value_max: self.header_value_max,
			mock_scenario: self.mock_scenario,
		};

		config.validate()?;

		Ok(config)
	}
}
