//! Access-token refresh with a singleflight guard and metrics.
//!
//! [`TokenRefreshCoordinator::ensure_valid_token`] is called before every authenticated
//! request. When the stored JWT is inside the expiry margin it calls
//! [`TokenRefreshCoordinator::force_refresh`], which is also the executor's 401 recovery path.
//! Concurrent callers share one network call: the first caller holds the flight guard, later
//! callers wait on it and observe the settled outcome instead of starting their own exchange.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, jwt},
	error::TransportError,
	http::{Headers, HttpMethod, HttpRequest, HttpTransport},
	obs::{self, RefreshOutcome, SecurityEvent},
	store::{StoreError, StoredTokens, TokenStore},
};

/// Default margin before `exp` at which a token is refreshed proactively.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::minutes(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
	access_token: Option<String>,
	refresh_token: Option<String>,
}

#[derive(Debug, ThisError)]
enum RefreshFailure {
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("Refresh request timed out.")]
	Timeout,
	#[error("Refresh endpoint answered with status {0}.")]
	Status(u16),
	#[error("Refresh response is not valid JSON: {0}.")]
	Malformed(#[from] serde_json::Error),
	#[error("Refresh response carries no access token.")]
	MissingAccessToken,
}

#[derive(Debug, Default)]
struct SettledRefresh {
	generation: u64,
	token: Option<TokenSecret>,
}

/// Keeps the stored access token fresh and deduplicates concurrent refreshes.
pub struct TokenRefreshCoordinator {
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	refresh_url: Url,
	expiry_margin: Duration,
	timeout: Duration,
	flight: AsyncMutex<()>,
	settled: Mutex<SettledRefresh>,
	metrics: Arc<RefreshMetrics>,
}
impl TokenRefreshCoordinator {
	/// Creates a coordinator that posts to `refresh_url` through `transport`.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
		refresh_url: Url,
	) -> Self {
		Self {
			transport,
			store,
			refresh_url,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
			timeout: Duration::seconds(15),
			flight: AsyncMutex::new(()),
			settled: Mutex::new(SettledRefresh::default()),
			metrics: Default::default(),
		}
	}

	/// Overrides the proactive refresh margin.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = margin;

		self
	}

	/// Overrides the refresh request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// Stores a fresh token pair, typically after login.
	pub async fn set_tokens(
		&self,
		access_token: impl Into<String>,
		refresh_token: Option<String>,
	) -> Result<(), StoreError> {
		self.store.save(StoredTokens::new(access_token, refresh_token)).await
	}

	/// Removes both tokens, typically on logout.
	pub async fn clear(&self) -> Result<(), StoreError> {
		self.store.clear().await
	}

	/// Returns the stored access token without checking its expiry.
	///
	/// A store failure is logged and treated as "no token".
	pub async fn access_token(&self) -> Option<TokenSecret> {
		match self.store.load().await {
			Ok(tokens) => tokens.access_token,
			Err(e) => {
				obs::record_security_event(SecurityEvent::TokenStoreFailed, Some(&e.to_string()));

				None
			},
		}
	}

	/// Returns a token suitable for the next request.
	///
	/// - No stored token: `None`.
	/// - Token outside the expiry margin: returned unchanged.
	/// - Otherwise the token is refreshed; if that fails the original token is returned and the
	///   server gets the final say.
	pub async fn ensure_valid_token(&self) -> Option<TokenSecret> {
		let token = self.access_token().await?;

		if !jwt::is_token_expiring_soon(
			token.expose(),
			self.expiry_margin,
			OffsetDateTime::now_utc(),
		) {
			return Some(token);
		}

		Some(self.force_refresh().await.unwrap_or(token))
	}

	/// Exchanges the refresh credentials for a new access token.
	///
	/// Callers arriving while a refresh is in flight wait for it and receive its outcome. On any
	/// failure the stored tokens are cleared and `None` is returned.
	pub async fn force_refresh(&self) -> Option<TokenSecret> {
		let observed = self.settled.lock().generation;
		let _flight = self.flight.lock().await;

		{
			let settled = self.settled.lock();

			if settled.generation != observed {
				self.metrics.record_shared();
				obs::record_refresh_outcome(RefreshOutcome::Shared);

				return settled.token.clone();
			}
		}

		let token = self.refresh_once().await;
		let mut settled = self.settled.lock();

		settled.generation += 1;
		settled.token = token.clone();

		token
	}

	async fn refresh_once(&self) -> Option<TokenSecret> {
		self.metrics.record_attempt();
		obs::record_refresh_outcome(RefreshOutcome::Attempt);

		match self.exchange().await {
			Ok(token) => {
				self.metrics.record_success();
				obs::record_refresh_outcome(RefreshOutcome::Success);
				obs::record_security_event(SecurityEvent::RefreshSucceeded, None);

				Some(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_refresh_outcome(RefreshOutcome::Failure);
				obs::record_security_event(SecurityEvent::RefreshFailed, Some(&e.to_string()));

				if let Err(e) = self.store.clear().await {
					obs::record_security_event(
						SecurityEvent::TokenStoreFailed,
						Some(&e.to_string()),
					);
				}

				None
			},
		}
	}

	async fn exchange(&self) -> Result<TokenSecret, RefreshFailure> {
		let stored = self.store.load().await?;
		let mut request = HttpRequest::new(HttpMethod::Post, self.refresh_url.clone())
			.with_headers(Headers::new().with("content-type", "application/json"));

		if let Some(refresh_token) = &stored.refresh_token {
			let body = serde_json::json!({ "refreshToken": refresh_token.expose() });

			request = request.with_body(body.to_string().into_bytes());
		}

		let response = tokio::time::timeout(self.timeout.unsigned_abs(), self.transport.send(request))
			.await
			.map_err(|_| RefreshFailure::Timeout)??;

		if !response.is_success() {
			return Err(RefreshFailure::Status(response.status));
		}

		let payload = serde_json::from_slice::<RefreshResponse>(&response.body)?;
		let access_token = payload
			.access_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.ok_or(RefreshFailure::MissingAccessToken)?;
		// Servers that do not rotate the refresh token keep the current one valid.
		let refresh_token = payload
			.refresh_token
			.filter(|token| !token.is_empty())
			.map(TokenSecret::new)
			.or(stored.refresh_token);

		self.store
			.save(StoredTokens { access_token: Some(access_token.clone()), refresh_token })
			.await?;

		Ok(access_token)
	}
}
impl Debug for TokenRefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefreshCoordinator")
			.field("refresh_url", &self.refresh_url.as_str())
			.field("expiry_margin", &self.expiry_margin)
			.field("timeout", &self.timeout)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
