// self
use crate::obs::{CallKind, CallOutcome};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_walker_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the outcome of a finished call from its result.
pub fn record_call_result<T, E>(kind: CallKind, result: &Result<T, E>) {
	match result {
		Ok(_) => record_call_outcome(kind, CallOutcome::Success),
		Err(_) => record_call_outcome(kind, CallOutcome::Failure),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_call_outcome_noop_without_metrics() {
		record_call_outcome(CallKind::Traversal, CallOutcome::Failure);
		record_call_result::<(), ()>(CallKind::ApiRequest, &Ok(()));
	}
}
