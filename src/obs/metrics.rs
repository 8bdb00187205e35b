// self
use crate::obs::{AttemptOutcome, RefreshOutcome};

/// Records an attempt outcome via the global metrics recorder (when enabled).
pub fn record_attempt_outcome(outcome: AttemptOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("resilient_http_attempt_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("resilient_http_refresh_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_safe_without_a_global_recorder() {
		record_attempt_outcome(AttemptOutcome::Retry);
		record_refresh_outcome(RefreshOutcome::Shared);
	}
}
