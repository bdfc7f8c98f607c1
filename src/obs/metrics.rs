// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter bumped once per flow step, labelled by `flow` and `outcome`.
pub const FLOW_COUNTER: &str = "member_proxy_flow_total";

/// Bumps [`FLOW_COUNTER`] for one proxied request, refresh exchange, or replay step.
///
/// Without the `metrics` feature this is a no-op.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
