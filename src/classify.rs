//! Failure classification.
//!
//! [`ErrorClassifier`] turns a non-2xx response or a transport failure into exactly one
//! [`ErrorKind`]. It is total: anything it does not recognize lands in
//! [`ErrorKind::Unclassified`]. Rate-limit hints are read from the response headers and are
//! left absent, never zero, when a header is missing or unparsable.

// crates.io
use http::{
	HeaderMap, StatusCode,
	header::{HeaderName, RETRY_AFTER},
};
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros};
// self
use crate::{
	_prelude::*,
	error::{ApiError, ErrorKind},
	transport::{HttpResponse, TransportError},
};

const IMF_FIXDATE: &[BorrowedFormatItem<'static>] = macros::format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);
const MESSAGE_FIELDS: [&str; 3] = ["message", "error_description", "error"];

/// Maps failures onto the closed [`ErrorKind`] taxonomy.
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
	remaining_header: HeaderName,
	reset_header: HeaderName,
}
impl ErrorClassifier {
	/// Creates a classifier reading rate-limit budget hints from custom header names.
	pub fn new(remaining_header: HeaderName, reset_header: HeaderName) -> Self {
		Self { remaining_header, reset_header }
	}

	/// Classifies a response status using the current UTC instant.
	pub fn classify_status(&self, status: StatusCode, headers: &HeaderMap) -> ErrorKind {
		self.classify_status_at(status, headers, OffsetDateTime::now_utc())
	}

	/// Classifies a response status, resolving HTTP-date `Retry-After` values against `now`.
	pub fn classify_status_at(
		&self,
		status: StatusCode,
		headers: &HeaderMap,
		now: OffsetDateTime,
	) -> ErrorKind {
		match status.as_u16() {
			401 => ErrorKind::Authentication,
			403 => ErrorKind::Authorization,
			404 => ErrorKind::NotFound,
			400 | 422 => ErrorKind::Validation,
			429 => ErrorKind::RateLimited {
				retry_after: header_str(headers, &RETRY_AFTER)
					.and_then(|value| parse_retry_after(value, now)),
				remaining: header_str(headers, &self.remaining_header)
					.and_then(|value| value.parse().ok()),
				reset_at: header_str(headers, &self.reset_header)
					.and_then(|value| value.parse().ok())
					.and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok()),
			},
			code if code >= 500 => ErrorKind::Server { status: code },
			code => ErrorKind::Unclassified { status: Some(code) },
		}
	}

	/// Classifies a failure to obtain any response.
	pub fn classify_transport(&self, error: &TransportError) -> ErrorKind {
		match error.code() {
			Some(code) => ErrorKind::Network { code },
			None => ErrorKind::Unclassified { status: None },
		}
	}

	/// Builds the user-visible error for a non-2xx response.
	pub fn response_error(&self, response: &HttpResponse, now: OffsetDateTime) -> ApiError {
		let status = response.status();
		let kind = self.classify_status_at(status, response.headers(), now);

		ApiError::new(kind, response_message(status, response.body()))
			.with_status(status.as_u16())
			.occurred_at(now)
	}

	/// Builds the user-visible error for a transport failure.
	pub fn transport_error(&self, error: TransportError, now: OffsetDateTime) -> ApiError {
		let kind = self.classify_transport(&error);

		ApiError::new(kind, error.to_string()).with_source(error).occurred_at(now)
	}
}
impl Default for ErrorClassifier {
	fn default() -> Self {
		Self::new(
			HeaderName::from_static("x-ratelimit-remaining"),
			HeaderName::from_static("x-ratelimit-reset"),
		)
	}
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim)
}

fn parse_retry_after(value: &str, now: OffsetDateTime) -> Option<StdDuration> {
	if let Ok(seconds) = value.parse::<u64>() {
		return Some(StdDuration::from_secs(seconds));
	}

	let at = PrimitiveDateTime::parse(value, IMF_FIXDATE).ok()?.assume_utc();

	// A date in the past means "now".
	Some(StdDuration::try_from(at - now).unwrap_or(StdDuration::ZERO))
}

pub(crate) fn response_message(status: StatusCode, body: &[u8]) -> String {
	serde_json::from_slice::<serde_json::Value>(body)
		.ok()
		.and_then(|value| {
			MESSAGE_FIELDS
				.iter()
				.find_map(|field| value.get(field).and_then(|v| v.as_str()).map(str::to_owned))
		})
		.filter(|message| !message.trim().is_empty())
		.unwrap_or_else(|| match status.canonical_reason() {
			Some(reason) => reason.to_owned(),
			None => format!("HTTP status {}", status.as_u16()),
		})
}
