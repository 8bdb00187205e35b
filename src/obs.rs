//! Optional observability helpers for request execution and credential upkeep.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap each logical call in a `resilient_http.request` span (fields
//!   `method` and `path`) and to emit one event per attempt named
//!   `http.client.request.{succeeded,retry,failed}`.
//! - Enable `metrics` to increment `resilient_http_attempt_total{outcome}` for every attempt and
//!   `resilient_http_refresh_total{outcome}` for every refresh.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each request attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
	/// The attempt produced the final, successful response.
	Succeeded,
	/// The attempt failed and another one is scheduled.
	Retry,
	/// The attempt failed and the error is returned to the caller.
	Failed,
}
impl AttemptOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AttemptOutcome::Succeeded => "succeeded",
			AttemptOutcome::Retry => "retry",
			AttemptOutcome::Failed => "failed",
		}
	}

	/// Structured event name emitted for this outcome.
	pub const fn event_name(self) -> &'static str {
		match self {
			AttemptOutcome::Succeeded => "http.client.request.succeeded",
			AttemptOutcome::Retry => "http.client.request.retry",
			AttemptOutcome::Failed => "http.client.request.failed",
		}
	}
}
impl Display for AttemptOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each token refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A refresh call was started.
	Attempt,
	/// New credentials were stored.
	Success,
	/// Stored credentials were cleared.
	Failure,
	/// A concurrent caller reused the in-flight outcome.
	Shared,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
			RefreshOutcome::Shared => "shared",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Security-relevant events logged outside the per-attempt stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecurityEvent {
	/// Access token rotated.
	RefreshSucceeded,
	/// Refresh failed and stored tokens were cleared.
	RefreshFailed,
	/// CSRF token could not be fetched.
	CsrfFetchFailed,
	/// The token store could not be read or written.
	TokenStoreFailed,
}
impl SecurityEvent {
	/// Structured event name.
	pub const fn as_str(self) -> &'static str {
		match self {
			SecurityEvent::RefreshSucceeded => "auth.refresh.succeeded",
			SecurityEvent::RefreshFailed => "auth.refresh.failed",
			SecurityEvent::CsrfFetchFailed => "csrf.fetch.failed",
			SecurityEvent::TokenStoreFailed => "auth.store.failed",
		}
	}
}
impl Display for SecurityEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
