// self
use crate::{
	obs::{CallKind, CallOutcome},
	refresh::RefreshOutcome,
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"console_api_call_total",
		"call" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how a refresh settled and how many queued callers it released.
pub fn record_refresh_settled(outcome: RefreshOutcome, queued: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("console_api_refresh_total", "outcome" => outcome.as_str()).increment(1);
		metrics::histogram!("console_api_refresh_queued").record(queued as f64);
	}

	#[cfg(not(feature = "metrics"))]
	let _ = (outcome, queued);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_noops_without_a_global_recorder() {
		record_call_outcome(CallKind::Refresh, CallOutcome::Failure);
		record_refresh_settled(RefreshOutcome::Expired, 3);
	}
}
