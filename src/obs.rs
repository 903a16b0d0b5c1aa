//! Optional observability helpers for token flows and API requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `spotify_dispatch.flow`
//!   with the `flow` and `stage` (call site) fields.
//! - Enable `metrics` to increment the `spotify_dispatch_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `spotify_dispatch_retry_total` counter for every transport retry, labeled by `reason`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token grant.
	Refresh,
	/// Client credentials grant.
	ClientCredentials,
	/// Resource API request.
	ApiRequest,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::ApiRequest => "api_request",
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
	/// Entry to an instrumented operation.
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
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reasons the transport retries a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryReason {
	/// The API answered `429 Too Many Requests`.
	RateLimited,
	/// The connection could not be established.
	Connect,
}
impl RetryReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RetryReason::RateLimited => "rate_limited",
			RetryReason::Connect => "connect",
		}
	}
}
impl Display for RetryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
