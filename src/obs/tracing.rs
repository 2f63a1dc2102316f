// self
use crate::{
	_prelude::*,
	config::GrantType,
	error::ErrorKind,
	obs::FlowKind,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token grants and request execution.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_courier.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
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

/// Debug event for a successful response.
pub fn request_succeeded(method: &http::Method, path: &str, status: u16, attempt: u32) {
	#[cfg(feature = "tracing")]
	tracing::debug!(%method, path, status, attempt, "Request succeeded.");

	#[cfg(not(feature = "tracing"))]
	let _ = (method, path, status, attempt);
}

/// Warn event for a retry decision.
pub fn request_retrying(
	method: &http::Method,
	path: &str,
	attempt: u32,
	max_attempts: u32,
	delay: StdDuration,
	kind: &ErrorKind,
	cause: &str,
) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		%method,
		path,
		attempt,
		max_attempts,
		delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
		kind = %kind,
		cause,
		"Request failed; retrying after backoff."
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (method, path, attempt, max_attempts, delay, kind, cause);
}

/// Error event for a request that used up every attempt.
pub fn request_exhausted(
	method: &http::Method,
	path: &str,
	attempts: u32,
	kind: &ErrorKind,
	status: Option<u16>,
) {
	#[cfg(feature = "tracing")]
	tracing::error!(%method, path, attempts, kind = %kind, status, "Request attempts exhausted.");

	#[cfg(not(feature = "tracing"))]
	let _ = (method, path, attempts, kind, status);
}

/// Error event for a failure that will not be retried.
pub fn request_failed(
	method: &http::Method,
	path: &str,
	attempt: u32,
	kind: &ErrorKind,
	status: Option<u16>,
) {
	#[cfg(feature = "tracing")]
	tracing::error!(%method, path, attempt, kind = %kind, status, "Request failed permanently.");

	#[cfg(not(feature = "tracing"))]
	let _ = (method, path, attempt, kind, status);
}

/// Debug event for a caller-initiated cancellation.
pub fn request_cancelled(method: &http::Method, path: &str, attempt: u32) {
	#[cfg(feature = "tracing")]
	tracing::debug!(%method, path, attempt, "Request cancelled by caller.");

	#[cfg(not(feature = "tracing"))]
	let _ = (method, path, attempt);
}

/// Debug event for a freshly issued token. Never logs the secret itself.
pub fn token_issued(grant: GrantType, expires_in: i64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(grant = grant.as_str(), expires_in, "Token issued.");

	#[cfg(not(feature = "tracing"))]
	let _ = (grant, expires_in);
}

/// Warn event for a token the resource server rejected.
pub fn token_rejected(status: u16) {
	#[cfg(feature = "tracing")]
	tracing::warn!(status, "Resource server rejected the bearer token; cache invalidated.");

	#[cfg(not(feature = "tracing"))]
	let _ = status;
}

/// Warn event for a persisted token the cache refused to use.
pub fn stored_token_discarded(key: &str, reason: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(key, reason, "Discarded persisted token.");

	#[cfg(not(feature = "tracing"))]
	let _ = (key, reason);
}

/// Warn event for a token store operation that failed without failing the caller.
pub fn store_degraded(operation: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(operation, error = %error, "Token store operation failed.");

	#[cfg(not(feature = "tracing"))]
	let _ = (operation, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Request, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn events_do_not_panic_without_a_subscriber() {
		request_retrying(
			&http::Method::GET,
			"/items",
			1,
			3,
			StdDuration::from_millis(250),
			&ErrorKind::Server { status: 503 },
			"Service unavailable.",
		);
		store_degraded("save", &"disk full");
	}
}
