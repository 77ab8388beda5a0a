//! Optional observability helpers for token exchanges, API requests, and traversals.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_walker.call` with the `call`
//!   (operation) and `stage` (call site) fields, plus debug/warn events for token refreshes,
//!   invalidations, retries, and traversal progress.
//! - Enable `metrics` to increment the `oauth2_walker_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Bearer token acquisition (cache lookup plus optional exchange).
	TokenExchange,
	/// Single authenticated resource request, including its retries.
	ApiRequest,
	/// Full collection traversal.
	Traversal,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::TokenExchange => "token_exchange",
			CallKind::ApiRequest => "api_request",
			CallKind::Traversal => "traversal",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to an instrumented operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
