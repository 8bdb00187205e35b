//! Client runtime owning every piece of shared request state.
//!
//! A [`Client`] bundles the transport, the token refresh coordinator, the CSRF token cache, the
//! retry sleeper, and the log redaction rules. Clones share all of it through `Arc`, so one
//! client per tenant (or per test) keeps state isolated without module-level globals.
//!
//! Each call goes through two layers:
//! - the retry loop (in [`retry`]) owns the attempt budget, backoff sleeps, schema decoding,
//!   and per-attempt logging;
//! - the executor owns header assembly, the send timeout, and the one-shot 401 refresh and 403
//!   CSRF recoveries.

pub mod config;
pub mod request;
pub mod retry;

mod executor;

pub use config::*;
pub use request::*;
pub use retry::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{RefreshMetrics, TokenRefreshCoordinator},
	csrf::CsrfTokenCache,
	error::ConfigError,
	http::HttpTransport,
	security::RedactOptions,
	store::{MemoryStore, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = Client<ReqwestTransport>;

/// Resilient JSON API client.
pub struct Client<T>
where
	T: HttpTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	auth: Arc<TokenRefreshCoordinator>,
	csrf: Arc<CsrfTokenCache>,
	sleeper: Arc<dyn Sleeper>,
	redact: Arc<RedactOptions>,
}
impl<T> Client<T>
where
	T: HttpTransport,
{
	/// Creates a client over `transport` with an in-memory token store.
	pub fn with_transport(config: ClientConfig, transport: Arc<T>) -> Result<Self, ConfigError> {
		Self::with_store(config, transport, Arc::new(MemoryStore::default()))
	}

	/// Creates a client over `transport` persisting tokens in `store`.
	pub fn with_store(
		config: ClientConfig,
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let refresh_url = config
			.endpoint(&config.refresh_path)
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let auth = TokenRefreshCoordinator::new(transport.clone(), store, refresh_url)
			.with_expiry_margin(config.expiry_margin)
			.with_timeout(config.timeout);

		Ok(Self {
			csrf: Arc::new(CsrfTokenCache::new(config.csrf_ttl)),
			config: Arc::new(config),
			transport,
			auth: Arc::new(auth),
			sleeper: Arc::new(TokioSleeper),
			redact: Default::default(),
		})
	}

	/// Replaces the backoff sleeper.
	pub fn with_sleeper(mut self, sleeper: impl Sleeper) -> Self {
		self.sleeper = Arc::new(sleeper);

		self
	}

	/// Replaces the redaction rules applied to logged request context.
	pub fn with_redaction(mut self, options: RedactOptions) -> Self {
		self.redact = Arc::new(options);

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token refresh coordinator (login, logout, and manual refresh live here).
	pub fn auth(&self) -> &TokenRefreshCoordinator {
		&self.auth
	}

	/// CSRF token cache.
	pub fn csrf_cache(&self) -> &CsrfTokenCache {
		&self.csrf
	}

	/// Shared refresh counters.
	pub fn refresh_metrics(&self) -> Arc<RefreshMetrics> {
		self.auth.metrics()
	}

	/// Sends a request and decodes the JSON body into `R`.
	///
	/// A body that does not match `R` fails with a non-retryable
	/// [`ErrorCode::ValidationError`] whose detail names the failing path.
	pub async fn request<R>(
		&self,
		path: &str,
		options: RequestOptions,
	) -> Result<ApiResponse<R>, ApiError>
	where
		R: DeserializeOwned,
	{
		self.run(path, options, decode_data::<R>).await
	}

	/// Sends a request and returns the raw JSON body.
	pub async fn request_value(
		&self,
		path: &str,
		options: RequestOptions,
	) -> Result<ApiResponse<Value>, ApiError> {
		self.run(path, options, Ok).await
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Creates a client with the default cookie-aware reqwest transport.
	pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
		Self::with_transport(config, Arc::new(ReqwestTransport::new()?))
	}
}
impl<T> Clone for Client<T>
where
	T: HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			auth: self.auth.clone(),
			csrf: self.csrf.clone(),
			sleeper: self.sleeper.clone(),
			redact: self.redact.clone(),
		}
	}
}
impl<T> Debug for Client<T>
where
	T: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("base_url", &self.config.base_url.as_str())
			.field("auth", &self.auth)
			.field("csrf", &self.csrf)
			.finish_non_exhaustive()
	}
}

fn decode_data<R>(data: Value) -> Result<R, ApiError>
where
	R: DeserializeOwned,
{
	serde_path_to_error::deserialize(data).map_err(|e| ApiError::schema_mismatch(e.path(), e.inner()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, error::ErrorCause};

	#[derive(Debug, Deserialize)]
	struct User {
		#[allow(dead_code)]
		id: u64,
		#[allow(dead_code)]
		email: String,
	}

	#[test]
	fn decode_reports_the_failing_path() {
		let err = decode_data::<Vec<User>>(serde_json::json!([
			{ "id": 1, "email": "a@example.com" },
			{ "id": 2, "email": null },
		]))
		.expect_err("A null email should not decode.");

		assert_eq!(err.code(), ErrorCode::ValidationError);
		assert_eq!(err.cause(), Some(ErrorCause::SchemaMismatch));
		assert!(!err.is_retryable());
		assert_eq!(err.detail().and_then(|detail| detail["path"].as_str()), Some("[1].email"));
	}

	#[test]
	fn clones_share_state() {
		let (client, _, _) = build_scripted_client(|builder| builder);
		let clone = client.clone();

		client.csrf_cache().set("shared-token");

		assert_eq!(clone.csrf_cache().get().as_deref(), Some("shared-token"));
		assert!(Arc::ptr_eq(&client.refresh_metrics(), &clone.refresh_metrics()));
	}

	#[test]
	fn debug_output_names_the_base_url() {
		let (client, _, _) = build_scripted_client(|builder| builder);
		let rendered = format!("{client:?}");

		assert!(rendered.contains("https://app.example.com/api"));
	}
}
