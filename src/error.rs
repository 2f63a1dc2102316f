//! Crate-level error types and the closed failure taxonomy shared by the classifier, the retry
//! policy, and the request executor.

// self
use crate::{_prelude::*, config::GrantType, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Classified failure from the authorization server or the resource API.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Storage-layer failure surfaced by an explicit store operation.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Successful response whose body does not match the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status of the response that failed to decode.
		status: u16,
	},
	/// Caller-supplied cancellation token fired before the request finished.
	#[error("Request was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns the classified kind when the failure came from a remote call.
	pub fn kind(&self) -> Option<&ErrorKind> {
		self.as_api().map(|api| &api.kind)
	}

	/// Returns the originating HTTP status, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(api) => api.status,
			Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Borrows the inner [`ApiError`], if any.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(api) => Some(api),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised before any network traffic.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Base URL is not an absolute http(s) URL.
	#[error("Base URL must be an absolute http(s) URL: {url}.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Client identifier is empty.
	#[error("Client identifier must not be empty.")]
	MissingClientId,
	/// Grant requires a client secret that was not configured.
	#[error("The {grant} grant requires a client secret.")]
	MissingClientSecret {
		/// Grant that needs the secret.
		grant: GrantType,
	},
	/// Operation needs a grant the client is not configured for.
	#[error("Client is configured for the {configured} grant and cannot perform the {requested} grant.")]
	UnsupportedGrant {
		/// Grant type the client was configured with.
		configured: GrantType,
		/// Grant type the caller attempted.
		requested: GrantType,
	},
	/// Hard-expiry buffer is not strictly smaller than the proactive refresh buffer.
	#[error(
		"Validity buffer ({validity}) must be non-negative and strictly smaller than the refresh buffer ({refresh})."
	)]
	InvalidFreshnessBuffers {
		/// Configured hard-expiry buffer.
		validity: Duration,
		/// Configured proactive refresh buffer.
		refresh: Duration,
	},
	/// Retry options violate their invariants.
	#[error("Retry options are invalid: {reason}.")]
	InvalidRetryOptions {
		/// Which invariant failed.
		reason: &'static str,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Header value contains characters HTTP does not allow.
	#[error(transparent)]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Low-level network failure codes that are worth retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkErrorCode {
	/// Peer reset the connection.
	ConnectionReset,
	/// Peer refused the connection.
	ConnectionRefused,
	/// Host name could not be resolved.
	DnsFailure,
	/// Connect or request deadline elapsed.
	Timeout,
}
impl NetworkErrorCode {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConnectionReset => "connection_reset",
			Self::ConnectionRefused => "connection_refused",
			Self::DnsFailure => "dns_failure",
			Self::Timeout => "timeout",
		}
	}
}
impl Display for NetworkErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Closed failure taxonomy; every failed attempt maps to exactly one variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// Credentials or bearer token were rejected (401) or no token could be obtained.
	Authentication,
	/// Caller is authenticated but not permitted (403).
	Authorization,
	/// Resource does not exist (404).
	NotFound,
	/// Request was malformed or semantically invalid (400, 422).
	Validation,
	/// Server throttled the caller (429).
	RateLimited {
		/// Server-dictated delay before the next attempt.
		retry_after: Option<StdDuration>,
		/// Remaining request quota reported by the server.
		remaining: Option<u64>,
		/// Instant the quota window resets.
		reset_at: Option<OffsetDateTime>,
	},
	/// Server-side failure (5xx).
	Server {
		/// HTTP status code.
		status: u16,
	},
	/// Transient transport failure.
	Network {
		/// Observed failure code.
		code: NetworkErrorCode,
	},
	/// Anything else; `status` is absent for unrecognized transport failures.
	Unclassified {
		/// HTTP status code, when a response was received.
		status: Option<u16>,
	},
}
impl ErrorKind {
	/// Builds a [`ErrorKind::RateLimited`] without timing hints.
	pub const fn rate_limited() -> Self {
		Self::RateLimited { retry_after: None, remaining: None, reset_at: None }
	}

	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Authentication => "authentication",
			Self::Authorization => "authorization",
			Self::NotFound => "not_found",
			Self::Validation => "validation",
			Self::RateLimited { .. } => "rate_limited",
			Self::Server { .. } => "server",
			Self::Network { .. } => "network",
			Self::Unclassified { .. } => "unclassified",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Server { status } => write!(f, "server({status})"),
			Self::Network { code } => write!(f, "network({code})"),
			Self::Unclassified { status: Some(status) } => write!(f, "unclassified({status})"),
			_ => f.write_str(self.as_str()),
		}
	}
}

/// User-visible failure of a remote call.
///
/// Carries the classified [`ErrorKind`], a human-readable message, the HTTP status when one
/// was received, and the instant the failure was observed. Rate-limit hints travel inside
/// [`ErrorKind::RateLimited`].
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct ApiError {
	/// Classified failure kind.
	pub kind: ErrorKind,
	/// Human-readable description.
	pub message: String,
	/// HTTP status code, when a response was received.
	pub status: Option<u16>,
	/// Instant the failure was observed.
	pub occurred_at: OffsetDateTime,
	/// Underlying cause, if any.
	#[source]
	pub source: Option<BoxError>,
}
impl ApiError {
	/// Creates an error stamped with the current UTC instant.
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			status: None,
			occurred_at: OffsetDateTime::now_utc(),
			source: None,
		}
	}

	/// Shorthand for an [`ErrorKind::Authentication`] failure.
	pub fn authentication(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Authentication, message)
	}

	/// Attaches the HTTP status code.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Attaches an underlying cause.
	pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
		self.source = Some(source.into());

		self
	}

	/// Overrides the observation instant.
	pub fn occurred_at(mut self, instant: OffsetDateTime) -> Self {
		self.occurred_at = instant;

		self
	}
}
