//! `esign_client_op_total` counter.
//!
//! Labels per `op`:
//! - `token`: `attempt` on each token endpoint call and `success` when it returns a `data.token`.
//!   Any error from `token`, including a failed cache read or write, records `failure`. Cache hits
//!   record nothing.
//! - `dispatch`: `attempt` once per request, `retry` for each rejection answered with a forced
//!   refresh, then a single `success` or `failure`.

// self
use crate::obs::{OpKind, OpOutcome};

/// Increments `esign_client_op_total` for `kind` and `outcome` on the installed recorder.
///
/// Without the `metrics` feature this does nothing.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"esign_client_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
