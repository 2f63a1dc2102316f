//! Optional observability helpers for token grants and API requests.
//!
//! # Feature Flags
//!
//! - `tracing` (default) wraps every grant and request in an `oauth2_courier.flow` span with
//!   `flow` and `stage` fields, and emits structured events: request/response detail and token
//!   issuance at debug, retry decisions and degraded store operations at warn, exhaustion and
//!   terminal failures at error.
//! - `metrics` increments the `oauth2_courier_flow_total` counter for every
//!   attempt/retry/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, config::GrantType};

/// Units of work observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client Credentials token grant.
	ClientCredentials,
	/// Authorization Code exchange.
	AuthorizationCode,
	/// Refresh Token grant.
	Refresh,
	/// Resource API request driven by the executor.
	Request,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::Request => "request",
		}
	}
}
impl From<GrantType> for FlowKind {
	fn from(grant: GrantType) -> Self {
		match grant {
			GrantType::ClientCredentials => FlowKind::ClientCredentials,
			GrantType::AuthorizationCode => FlowKind::AuthorizationCode,
			GrantType::RefreshToken => FlowKind::Refresh,
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow (or a single request attempt).
	Attempt,
	/// A failed attempt that will be retried.
	Retry,
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
			FlowOutcome::Retry => "retry",
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
