//! HTTP transport seam shared by the token provider and the request executor.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. It moves plain
//! [`http`] requests and responses so any client can be plugged in; non-2xx statuses are
//! ordinary responses, and only failures to obtain a response surface as
//! [`TransportError`]. Implementations should tag those failures with a
//! [`NetworkErrorCode`] when they can tell what went wrong, so the classifier can decide
//! whether waiting will help.

// std
use std::io::ErrorKind as IoErrorKind;
// self
use crate::{
	_prelude::*,
	error::{BoxError, NetworkErrorCode},
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Request type handed to transports.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response type returned by transports.
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by
/// the token provider and every concurrent request. Redirects should not be followed: token
/// endpoints answer directly, and resource redirects are surfaced to the caller.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with whatever response the server produced.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Failure to obtain any HTTP response.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Recognized failure code, if any.
		code: Option<NetworkErrorCode>,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Request could not be converted into the client's native request type.
	#[error("Request could not be handed to the HTTP client.")]
	Request {
		/// Conversion failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error, inferring the code from its source chain.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		let code = error_chain_code(&src);

		Self::Network { code, source: Box::new(src) }
	}

	/// Wraps a timeout raised outside the client (e.g. by a deadline around the call).
	pub fn timeout(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { code: Some(NetworkErrorCode::Timeout), source: Box::new(src) }
	}

	/// Returns the recognized network failure code, if any.
	pub fn code(&self) -> Option<NetworkErrorCode> {
		match self {
			Self::Network { code, .. } => *code,
			Self::Io(e) => io_error_code(e.kind()),
			Self::Request { .. } => None,
		}
	}
}

/// Sends `request`, failing with a [`NetworkErrorCode::Timeout`] once `timeout` elapses.
pub(crate) async fn send_with_timeout(
	transport: &dyn HttpTransport,
	request: HttpRequest,
	timeout: Option<StdDuration>,
) -> Result<HttpResponse, TransportError> {
	match timeout {
		Some(timeout) => tokio::time::timeout(timeout, transport.send(request))
			.await
			.unwrap_or_else(|elapsed| Err(TransportError::timeout(elapsed))),
		None => transport.send(request).await,
	}
}

/// Maps an IO error kind onto the retryable network codes.
pub fn io_error_code(kind: IoErrorKind) -> Option<NetworkErrorCode> {
	match kind {
		IoErrorKind::ConnectionReset | IoErrorKind::ConnectionAborted | IoErrorKind::BrokenPipe =>
			Some(NetworkErrorCode::ConnectionReset),
		IoErrorKind::ConnectionRefused => Some(NetworkErrorCode::ConnectionRefused),
		IoErrorKind::TimedOut => Some(NetworkErrorCode::Timeout),
		_ => None,
	}
}

/// Walks an error's source chain looking for a recognizable network failure.
pub fn error_chain_code(err: &(dyn StdError + 'static)) -> Option<NetworkErrorCode> {
	let mut current = Some(err);

	while let Some(e) = current {
		if let Some(code) = e.downcast_ref::<std::io::Error>().and_then(|io| io_error_code(io.kind()))
		{
			return Some(code);
		}

		let message = e.to_string();

		if message.contains("dns error") || message.contains("failed to lookup address") {
			return Some(NetworkErrorCode::DnsFailure);
		}

		current = e.source();
	}

	None
}

/// [`HttpTransport`] backed by a shared reqwest [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a rustls-backed client with redirect following disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::Request { source: Box::new(e) })?;
			let response = client.execute(request).await.map_err(map_reqwest_error)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();
			let mut converted = HttpResponse::new(body);

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> TransportError {
	if err.is_builder() {
		return TransportError::Request { source: Box::new(err) };
	}
	if err.is_timeout() {
		return TransportError::timeout(err);
	}

	TransportError::network(err)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, ThisError)]
	#[error("client error (Connect)")]
	struct Outer(#[source] Inner);

	#[derive(Debug, ThisError)]
	#[error("dns error: failed to lookup address information")]
	struct Inner;

	#[test]
	fn io_kinds_map_to_network_codes() {
		assert_eq!(
			io_error_code(IoErrorKind::ConnectionReset),
			Some(NetworkErrorCode::ConnectionReset)
		);
		assert_eq!(
			io_error_code(IoErrorKind::ConnectionRefused),
			Some(NetworkErrorCode::ConnectionRefused)
		);
		assert_eq!(io_error_code(IoErrorKind::TimedOut), Some(NetworkErrorCode::Timeout));
		assert_eq!(io_error_code(IoErrorKind::PermissionDenied), None);
	}

	#[test]
	fn source_chain_reveals_dns_failures() {
		let err = TransportError::network(Outer(Inner));

		assert_eq!(err.code(), Some(NetworkErrorCode::DnsFailure));
	}

	#[test]
	fn io_errors_inside_the_chain_are_found() {
		let err = TransportError::network(std::io::Error::from(IoErrorKind::ConnectionReset));

		assert_eq!(err.code(), Some(NetworkErrorCode::ConnectionReset));

		let err: TransportError = std::io::Error::other("unexpected").into();

		assert_eq!(err.code(), None);
	}
}
