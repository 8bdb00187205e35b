//! Retry policy, jittered exponential backoff, and the sleeper seam.

// std
use std::time::Instant;
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	client::{ApiResponse, Client, RequestOptions, executor::Call},
	http::HttpTransport,
	obs::{self, AttemptOutcome, AttemptRecord, RequestSpan},
	security::{generate_request_id, sanitize_log_context, sanitize_log_text},
};

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Attempts per logical call unless overridden.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Statuses retried unless overridden.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

const BASE_DELAY_MS: f64 = 1_000.;
const MAX_DELAY_MS: f64 = 30_000.;
const JITTER_RATIO: f64 = 0.2;

/// Waits between attempts. Swapped out in tests to observe delays without waiting.
pub trait Sleeper
where
	Self: 'static + Send + Sync,
{
	/// Resolves after `delay`.
	fn sleep(&self, delay: Duration) -> SleepFuture<'_>;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;
impl Sleeper for TokioSleeper {
	fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
		let delay = if delay.is_negative() { Duration::ZERO } else { delay };

		Box::pin(tokio::time::sleep(delay.unsigned_abs()))
	}
}

/// Retry policy for one logical call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
	/// Total attempts, including the first one. Must be at least 1.
	pub max_attempts: u32,
	/// Sleep [`backoff_delay`] between attempts.
	pub enable_backoff: bool,
	/// Statuses considered transient.
	pub retryable_statuses: Vec<u16>,
}
impl RetryConfig {
	/// Overrides the attempt budget.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Toggles backoff sleeps.
	pub fn with_backoff(mut self, enable_backoff: bool) -> Self {
		self.enable_backoff = enable_backoff;

		self
	}

	/// Replaces the retryable status set.
	pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
		self.retryable_statuses = statuses.into_iter().collect();

		self
	}

	/// Whether `status` is in the retryable set. A missing status is never retryable here.
	pub fn should_retry_status(&self, status: Option<u16>) -> bool {
		status.is_some_and(|status| self.retryable_statuses.contains(&status))
	}

	/// Whether `err`, raised by the zero-based `attempt`, earns another attempt.
	pub fn should_retry(&self, err: &ApiError, attempt: u32) -> bool {
		let transient = self.should_retry_status(err.status()) || err.code().is_transport_level();

		err.is_retryable() && transient && attempt + 1 < self.max_attempts
	}

	/// Applies per-request overrides on top of `self`.
	pub fn merged(&self, overrides: &RetryOverrides) -> Self {
		Self {
			max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts),
			enable_backoff: overrides.enable_backoff.unwrap_or(self.enable_backoff),
			retryable_statuses: overrides
				.retryable_statuses
				.clone()
				.unwrap_or_else(|| self.retryable_statuses.clone()),
		}
	}
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			enable_backoff: true,
			retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
		}
	}
}

/// Per-request retry overrides; unset fields inherit the client defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryOverrides {
	/// Attempt budget.
	pub max_attempts: Option<u32>,
	/// Backoff toggle.
	pub enable_backoff: Option<bool>,
	/// Retryable status set.
	pub retryable_statuses: Option<Vec<u16>>,
}
impl RetryOverrides {
	/// Overrides the attempt budget.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = Some(max_attempts);

		self
	}

	/// Overrides the backoff toggle.
	pub fn with_backoff(mut self, enable_backoff: bool) -> Self {
		self.enable_backoff = Some(enable_backoff);

		self
	}

	/// Overrides the retryable status set.
	pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
		self.retryable_statuses = Some(statuses.into_iter().collect());

		self
	}
}

/// Delay before the retry following zero-based retry index `n`: `2^n` seconds with ±20% jitter,
/// capped at 30 seconds.
pub fn backoff_delay(n: u32) -> Duration {
	backoff_delay_with(n, rand::rng().random_range(-1.0..=1.0))
}

/// [`backoff_delay`] with an explicit jitter unit in `[-1, 1]`.
pub fn backoff_delay_with(n: u32, jitter_unit: f64) -> Duration {
	let base = 2_f64.powi(n.min(31) as i32) * BASE_DELAY_MS;
	let jitter = base * JITTER_RATIO * jitter_unit.clamp(-1., 1.);
	let millis = (base + jitter).clamp(0., MAX_DELAY_MS);

	Duration::milliseconds(millis.round() as i64)
}

impl<T> Client<T>
where
	T: HttpTransport,
{
	/// Drives the attempt loop for one logical call.
	///
	/// The correlation id is generated once and reused by every attempt, so server logs can
	/// stitch retries together.
	pub(super) async fn run<R>(
		&self,
		path: &str,
		options: RequestOptions,
		decode: fn(Value) -> Result<R, ApiError>,
	) -> Result<ApiResponse<R>, ApiError> {
		let request_id = generate_request_id();
		let retry = self.config.retry.merged(&options.retry);
		let context = options
			.context
			.as_ref()
			.map(|context| sanitize_log_context(&context.to_value(), &self.redact));
		let call = Call { path, options: &options, request_id: &request_id, retry: &retry };
		let span = RequestSpan::new(options.method, path);

		span.instrument(async {
			let started = Instant::now();
			let mut attempt = 0;

			loop {
				if attempt > 0 && retry.enable_backoff {
					self.sleeper.sleep(backoff_delay(attempt - 1)).await;
				}

				let result = self.execute(&call).await.and_then(|response| {
					let data = decode(response.data)?;

					Ok(ApiResponse { data, status: response.status, headers: response.headers })
				});
				let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
				let mut record = AttemptRecord {
					outcome: AttemptOutcome::Succeeded,
					method: options.method,
					path,
					request_id: &request_id,
					attempt: attempt + 1,
					duration_ms,
					status: None,
					code: None,
					message: None,
					context: context.as_ref(),
				};

				match result {
					Ok(response) => {
						record.status = Some(response.status);

						obs::record_attempt(&record);
						obs::record_attempt_outcome(record.outcome);

						return Ok(response);
					},
					Err(e) => {
						let retrying = retry.should_retry(&e, attempt);
						let message = sanitize_log_text(e.message(), &self.redact);

						record.outcome =
							if retrying { AttemptOutcome::Retry } else { AttemptOutcome::Failed };
						record.status = e.status();
						record.code = Some(e.code());
						record.message = Some(&message);

						obs::record_attempt(&record);
						obs::record_attempt_outcome(record.outcome);

						if !retrying {
							return Err(e);
						}
					},
				}

				attempt += 1;
			}
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{ApiErrorParams, ErrorCode};

	#[test]
	fn backoff_grows_and_caps() {
		assert_eq!(backoff_delay_with(0, 0.), Duration::seconds(1));
		assert_eq!(backoff_delay_with(1, 0.), Duration::seconds(2));
		assert_eq!(backoff_delay_with(2, 1.), Duration::milliseconds(4_800));
		assert_eq!(backoff_delay_with(2, -1.), Duration::milliseconds(3_200));
		assert_eq!(backoff_delay_with(10, 0.), Duration::seconds(30));
		assert_eq!(backoff_delay_with(u32::MAX, 1.), Duration::seconds(30));
	}

	#[test]
	fn random_backoff_stays_in_bounds() {
		for n in 0..8 {
			let delay = backoff_delay(n);

			assert!(delay >= Duration::ZERO && delay <= Duration::seconds(30), "{delay}");
		}
	}

	#[test]
	fn status_predicate_ignores_missing_status() {
		let config = RetryConfig::default();

		assert!(config.should_retry_status(Some(503)));
		assert!(!config.should_retry_status(Some(404)));
		assert!(!config.should_retry_status(None));
	}

	#[test]
	fn retry_decision_requires_flag_reason_and_budget() {
		let config = RetryConfig::default();
		let server = ApiError::new(ApiErrorParams::new(ErrorCode::ServerError, true).with_status(503));
		let flagged_off =
			ApiError::new(ApiErrorParams::new(ErrorCode::ServerError, false).with_status(503));
		let business =
			ApiError::new(ApiErrorParams::new(ErrorCode::BusinessError, true).with_status(422));

		assert!(config.should_retry(&server, 0));
		assert!(config.should_retry(&server, 1));
		assert!(!config.should_retry(&server, 2));
		assert!(!config.should_retry(&flagged_off, 0));
		assert!(!config.should_retry(&business, 0));
		assert!(config.should_retry(&ApiError::network(), 0));
		assert!(config.should_retry(&ApiError::timeout(), 1));
	}

	#[test]
	fn overrides_inherit_unset_fields() {
		let merged = RetryConfig::default()
			.merged(&RetryOverrides::default().with_max_attempts(1).with_retryable_statuses([599]));

		assert_eq!(merged.max_attempts, 1);
		assert!(merged.enable_backoff);
		assert_eq!(merged.retryable_statuses, vec![599]);
	}
}
