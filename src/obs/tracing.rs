// self
use crate::{
	_prelude::*,
	http::HttpMethod,
	obs::{AttemptOutcome, SecurityEvent},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one logical call (all attempts, refreshes, and CSRF fetches).
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the method and path.
	pub fn new(method: HttpMethod, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("resilient_http.request", method = method.as_str(), path);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Fields logged once per attempt.
#[derive(Clone, Debug)]
pub struct AttemptRecord<'a> {
	/// What happened to the attempt.
	pub outcome: AttemptOutcome,
	/// Request method.
	pub method: HttpMethod,
	/// Request path (without base URL or query).
	pub path: &'a str,
	/// Correlation id shared by every attempt of the call.
	pub request_id: &'a str,
	/// One-based attempt number.
	pub attempt: u32,
	/// Time since the logical call started.
	pub duration_ms: u64,
	/// HTTP status, when one was received.
	pub status: Option<u16>,
	/// Error code, for failed attempts.
	pub code: Option<ErrorCode>,
	/// Error message, for failed attempts; already control-stripped and truncated.
	pub message: Option<&'a str>,
	/// Caller context, already passed through the log redactor.
	pub context: Option<&'a Value>,
}

/// Emits the structured event for one attempt: debug on success, warn on retry, error on
/// terminal failure.
pub fn record_attempt(record: &AttemptRecord<'_>) {
	#[cfg(feature = "tracing")]
	{
		let event = record.outcome.event_name();
		let method = record.method.as_str();
		let status = record.status.unwrap_or_default();
		let code = record.code.map(ErrorCode::as_str).unwrap_or_default();
		let message = record.message.unwrap_or_default();
		let context = record.context.map(Value::to_string).unwrap_or_default();

		match record.outcome {
			AttemptOutcome::Succeeded => tracing::debug!(
				event,
				path = record.path,
				method,
				request_id = record.request_id,
				attempt = record.attempt,
				duration_ms = record.duration_ms,
				status,
				context = %context,
				"API request succeeded"
			),
			AttemptOutcome::Retry => tracing::warn!(
				event,
				path = record.path,
				method,
				request_id = record.request_id,
				attempt = record.attempt,
				duration_ms = record.duration_ms,
				status,
				code,
				error = message,
				context = %context,
				"API request failed and will retry"
			),
			AttemptOutcome::Failed => tracing::error!(
				event,
				path = record.path,
				method,
				request_id = record.request_id,
				attempt = record.attempt,
				duration_ms = record.duration_ms,
				status,
				code,
				error = message,
				context = %context,
				"API request failed"
			),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = record;
	}
}

/// Emits a security event; successes at debug, everything else at warn.
pub fn record_security_event(event: SecurityEvent, reason: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		let name = event.as_str();
		let reason = reason.unwrap_or_default();

		match event {
			SecurityEvent::RefreshSucceeded => tracing::debug!(event = name, "Access token refreshed"),
			_ => tracing::warn!(event = name, reason, "Credential upkeep failed"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, reason);
	}
}
