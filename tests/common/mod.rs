//! Scripted in-memory transport shared by the integration tests.
//!
//! Items marked `allow(dead_code)` are only used by some of the test binaries.

// std
use std::{
	collections::VecDeque,
	io::ErrorKind as IoErrorKind,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
use tokio::time::Instant;
// self
use oauth2_courier::{
	config::{ClientConfig, GrantType},
	retry::RetryOptions,
	transport::{HttpRequest, HttpResponse, HttpTransport, TransportError, TransportFuture},
	url::Url,
};

pub const BASE_URL: &str = "https://api.example.com/v1/";

/// One scripted answer for a resource call.
#[allow(dead_code)]
pub enum Reply {
	/// Respond with a status, headers, and a body.
	Status { status: u16, headers: Vec<(&'static str, &'static str)>, body: &'static str },
	/// Fail at the transport level with an IO error of the given kind.
	Fail(IoErrorKind),
	/// Never respond.
	Hang,
}
#[allow(dead_code)]
impl Reply {
	pub fn status(status: u16) -> Self {
		Self::Status { status, headers: Vec::new(), body: "" }
	}

	pub fn json(status: u16, body: &'static str) -> Self {
		Self::Status { status, headers: vec![("content-type", "application/json")], body }
	}

	pub fn with_header(self, name: &'static str, value: &'static str) -> Self {
		match self {
			Self::Status { status, mut headers, body } => {
				headers.push((name, value));

				Self::Status { status, headers, body }
			},
			other => other,
		}
	}
}

/// Request as observed by the transport.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct Seen {
	pub method: String,
	pub path: String,
	pub query: Option<String>,
	pub authorization: Option<String>,
	pub body: String,
	pub at: Instant,
}

/// How the scripted token endpoint answers.
#[allow(dead_code)]
enum TokenEndpoint {
	/// Issue `t1`, `t2`, ... valid for one hour.
	Issue,
	/// Reject every grant with the given status.
	Reject(u16),
	/// Never respond.
	Hang,
}

/// Serves `/oauth/token` with sequentially numbered tokens (`t1`, `t2`, ...) and answers
/// every other path from a queue of [`Reply`] values (`200 {}` once the queue is empty).
pub struct ScriptedTransport {
	token_calls: AtomicUsize,
	token_endpoint: TokenEndpoint,
	replies: Mutex<VecDeque<Reply>>,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedTransport {
	pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
		Self::build(replies, TokenEndpoint::Issue)
	}

	#[allow(dead_code)]
	pub fn with_token_status(status: u16) -> Arc<Self> {
		Self::build([], TokenEndpoint::Reject(status))
	}

	#[allow(dead_code)]
	pub fn with_hanging_token_endpoint() -> Arc<Self> {
		Self::build([], TokenEndpoint::Hang)
	}

	fn build(replies: impl IntoIterator<Item = Reply>, token_endpoint: TokenEndpoint) -> Arc<Self> {
		Arc::new(Self {
			token_calls: AtomicUsize::new(0),
			token_endpoint,
			replies: Mutex::new(replies.into_iter().collect()),
			seen: Mutex::new(Vec::new()),
		})
	}

	pub fn token_calls(&self) -> usize {
		self.token_calls.load(Ordering::SeqCst)
	}

	/// Resource requests only; token requests are counted separately.
	#[allow(dead_code)]
	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let (parts, body) = request.into_parts();
		let path = parts.uri.path().to_owned();

		if path.ends_with("/oauth/token") {
			let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
			let response = match self.token_endpoint {
				TokenEndpoint::Issue => response(
					200,
					&[],
					format!(r#"{{"access_token":"t{n}","expires_in":3600}}"#),
				),
				TokenEndpoint::Reject(status) =>
					response(status, &[], r#"{"error":"invalid_client"}"#.to_owned()),
				TokenEndpoint::Hang =>
					return Box::pin(std::future::pending::<Result<HttpResponse, TransportError>>()),
			};

			return Box::pin(async move { Ok(response) });
		}

		self.seen.lock().push(Seen {
			method: parts.method.to_string(),
			path,
			query: parts.uri.query().map(str::to_owned),
			authorization: parts
				.headers
				.get("authorization")
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			body: String::from_utf8_lossy(&body).into_owned(),
			at: Instant::now(),
		});

		let reply = self.replies.lock().pop_front().unwrap_or_else(|| Reply::json(200, "{}"));

		Box::pin(async move {
			match reply {
				Reply::Status { status, headers, body } =>
					Ok(response(status, &headers, body.to_owned())),
				Reply::Fail(kind) => Err(TransportError::network(std::io::Error::from(kind))),
				Reply::Hang => std::future::pending().await,
			}
		})
	}
}

fn response(status: u16, headers: &[(&'static str, &'static str)], body: String) -> HttpResponse {
	let mut builder = http::Response::builder().status(status);

	for (name, value) in headers {
		builder = builder.header(*name, *value);
	}

	builder.body(body.into_bytes()).expect("Scripted response should build.")
}

/// Client-credentials config with deterministic, fast retries.
pub fn config(max_attempts: u32) -> ClientConfig {
	ClientConfig::builder(Url::parse(BASE_URL).expect("Base URL should parse."), "client-1")
		.client_secret("s3cr3t")
		.grant_type(GrantType::ClientCredentials)
		.retry_options(
			RetryOptions::default()
				.with_max_attempts(max_attempts)
				.with_initial_delay(Duration::from_millis(100))
				.with_max_delay(Duration::from_secs(5))
				.with_jitter(false),
		)
		.build()
		.expect("Config fixture should build.")
}
