//! Optional observability helpers for the login and lease pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `vault_aws_lease.flow` carrying `flow` (pipeline step)
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment `vault_aws_lease_flow_total` for every attempt, success, and
//!   failure, labeled by `flow` and `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline steps observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Building and signing an identity proof.
	SignProof,
	/// Exchanging a proof for a broker session.
	Login,
	/// Fetching a credential lease from the broker.
	LeaseFetch,
	/// Resolving ambient AWS credentials.
	ResolveCredentials,
	/// Sending a SigV4-signed downstream request.
	SignedCall,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::SignProof => "sign_proof",
			FlowKind::Login => "login",
			FlowKind::LeaseFetch => "lease_fetch",
			FlowKind::ResolveCredentials => "resolve_credentials",
			FlowKind::SignedCall => "signed_call",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a pipeline step.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_snake_case() {
		assert_eq!(FlowKind::ResolveCredentials.to_string(), "resolve_credentials");
		assert_eq!(FlowOutcome::of(&Ok::<_, ()>(1)), FlowOutcome::Success);
		assert_eq!(FlowOutcome::of(&Err::<(), _>("boom")), FlowOutcome::Failure);
	}
}
