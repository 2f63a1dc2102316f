//! Resilient execution of one logical API request.
//!
//! [`RequestExecutor::execute`] runs the pipeline explicitly: attach a fresh bearer token,
//! call the transport under a per-attempt timeout, classify any failure, and either retry
//! after the policy's delay or give up. Every wait in the loop races the caller's
//! [`CancellationToken`], including the token fetch.
//!
//! ```text
//! Attempting -> Succeeded
//!            -> Failed (non-retryable)
//!            -> Retrying -> Attempting
//!            -> Failed (exhausted, last error)
//!            -> Cancelled
//! ```

// crates.io
use http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{AuthCoordinator, Secret},
	classify::ErrorClassifier,
	config::{self, ClientConfig},
	error::{ApiError, ConfigError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	retry::{RetryOptions, RetryPolicy},
	store::TokenStore,
	transport::{self, HttpRequest, HttpResponse, HttpTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

const JSON: &str = "application/json";

/// Description of one logical request, immutable for the duration of the call.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path appended to the configured base URL.
	pub path: String,
	/// Extra headers; they replace defaults of the same name, except `Authorization`.
	pub headers: HeaderMap,
	/// Query parameters.
	pub query: Vec<(String, String)>,
	/// JSON body.
	pub body: Option<serde_json::Value>,
	/// Per-attempt timeout; falls back to the client default.
	pub timeout: Option<StdDuration>,
	/// Cancels the whole call, across all attempts.
	pub cancellation: Option<CancellationToken>,
	/// Overrides the client's maximum attempts for this call.
	pub retry_override: Option<u32>,
}
impl RequestDescriptor {
	/// Creates a descriptor for `method` + `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: HeaderMap::new(),
			query: Vec::new(),
			body: None,
			timeout: None,
			cancellation: None,
			retry_override: None,
		}
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Adds a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets the JSON body.
	pub fn json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` and sets it as the JSON body.
	pub fn json_body<T>(self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let value =
			serde_json::to_value(body).map_err(|e| ConfigError::RequestBody { source: e })?;

		Ok(self.json(value))
	}

	/// Sets the per-attempt timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Attaches a cancellation token.
	pub fn cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Overrides the maximum attempts for this call.
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.retry_override = Some(attempts);

		self
	}
}

/// Successful (2xx) response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let deserializer = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}
impl From<HttpResponse> for ApiResponse {
	fn from(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}
}

/// Drives requests against one API with authentication, classification, and retries.
pub struct RequestExecutor {
	auth: Arc<AuthCoordinator>,
	transport: Arc<dyn HttpTransport>,
	base_url: Url,
	classifier: ErrorClassifier,
	policy: RetryPolicy,
	retry: RetryOptions,
	default_timeout: Option<StdDuration>,
}
impl RequestExecutor {
	/// Creates an executor sharing an existing coordinator.
	pub fn new(
		config: &ClientConfig,
		auth: Arc<AuthCoordinator>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self {
			auth,
			transport,
			base_url: config.base_url.clone(),
			classifier: ErrorClassifier::default(),
			policy: RetryPolicy,
			retry: config.retry.clone(),
			default_timeout: config.request_timeout,
		}
	}

	/// Builds the coordinator and the executor from one configuration and transport.
	pub fn from_config(
		config: &ClientConfig,
		store: Arc<dyn TokenStore>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		let auth = Arc::new(AuthCoordinator::from_config(config, store, transport.clone()));

		Self::new(config, auth, transport)
	}

	/// [`RequestExecutor::from_config`] over a default [`ReqwestTransport`].
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(
		config: &ClientConfig,
		store: Arc<dyn TokenStore>,
	) -> Result<Self, ConfigError> {
		let transport = Arc::new(ReqwestTransport::new()?);

		Ok(Self::from_config(config, store, transport))
	}

	/// Replaces the classifier (e.g. to read differently named rate-limit headers).
	pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
		self.classifier = classifier;

		self
	}

	/// Coordinator used to authenticate requests.
	pub fn auth(&self) -> &Arc<AuthCoordinator> {
		&self.auth
	}

	/// Executes `descriptor`, retrying transient failures.
	pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "execute");
		let result = span.instrument(self.run(descriptor)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Executes `descriptor` and decodes the success body as JSON.
	pub async fn execute_json<T>(&self, descriptor: &RequestDescriptor) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.execute(descriptor).await?.json()
	}

	async fn run(&self, descriptor: &RequestDescriptor) -> Result<ApiResponse> {
		let max_attempts = descriptor.retry_override.unwrap_or(self.retry.max_attempts).max(1);
		let timeout = descriptor.timeout.or(self.default_timeout);
		let cancel = descriptor.cancellation.clone().unwrap_or_default();
		let url = self.url_for(descriptor);
		let body = descriptor
			.body
			.as_ref()
			.map(serde_json::to_vec)
			.transpose()
			.map_err(|e| ConfigError::RequestBody { source: e })?;
		let mut attempt = 1;

		loop {
			if cancel.is_cancelled() {
				return Err(cancelled(descriptor, attempt));
			}

			obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Attempt);

			let token = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled(descriptor, attempt)),
				token = self.auth.refresh_if_needed() => token?,
			};
			let request = build_request(descriptor, &url, &token, body.clone())?;
			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled(descriptor, attempt)),
				outcome = transport::send_with_timeout(self.transport.as_ref(), request, timeout) =>
					outcome,
			};
			let now = OffsetDateTime::now_utc();
			let error = match outcome {
				Ok(response) if response.status().is_success() => {
					obs::request_succeeded(
						&descriptor.method,
						&descriptor.path,
						response.status().as_u16(),
						attempt,
					);

					return Ok(response.into());
				},
				Ok(response) => self.rejected(&response, now).await,
				Err(e) => self.classifier.transport_error(e, now),
			};

			if !self.policy.is_retryable(&error.kind) {
				obs::request_failed(
					&descriptor.method,
					&descriptor.path,
					attempt,
					&error.kind,
					error.status,
				);

				return Err(error.into());
			}
			if attempt >= max_attempts {
				obs::request_exhausted(
					&descriptor.method,
					&descriptor.path,
					attempt,
					&error.kind,
					error.status,
				);

				return Err(error.into());
			}

			let delay = self.policy.delay_for(attempt, &error.kind, &self.retry);

			obs::request_retrying(
				&descriptor.method,
				&descriptor.path,
				attempt,
				max_attempts,
				delay,
				&error.kind,
				&error.message,
			);
			obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Retry);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled(descriptor, attempt)),
				_ = tokio::time::sleep(delay) => {},
			}

			attempt += 1;
		}
	}

	async fn rejected(&self, response: &HttpResponse, now: OffsetDateTime) -> ApiError {
		let error = self.classifier.response_error(response, now);

		if response.status() == StatusCode::UNAUTHORIZED {
			self.auth.invalidate().await;
			obs::token_rejected(response.status().as_u16());
		}

		error
	}

	fn url_for(&self, descriptor: &RequestDescriptor) -> Url {
		let mut url = config::join_path(&self.base_url, &descriptor.path);

		if !descriptor.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&descriptor.query);
		}

		url
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("base_url", &self.base_url.as_str())
			.field("classifier", &self.classifier)
			.field("retry", &self.retry)
			.field("default_timeout", &self.default_timeout)
			.finish()
	}
}

fn build_request(
	descriptor: &RequestDescriptor,
	url: &Url,
	token: &Secret,
	body: Option<Vec<u8>>,
) -> Result<HttpRequest, ConfigError> {
	let mut request = http::Request::builder()
		.method(descriptor.method.clone())
		.uri(url.as_str())
		.body(body.unwrap_or_default())?;
	let headers = request.headers_mut();

	headers.insert(ACCEPT, HeaderValue::from_static(JSON));
	headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));

	for name in descriptor.headers.keys() {
		headers.remove(name);
	}
	for (name, value) in &descriptor.headers {
		headers.append(name.clone(), value.clone());
	}

	let mut authorization = HeaderValue::try_from(token.bearer())?;

	authorization.set_sensitive(true);
	headers.insert(AUTHORIZATION, authorization);

	Ok(request)
}

fn cancelled(descriptor: &RequestDescriptor, attempt: u32) -> Error {
	obs::request_cancelled(&descriptor.method, &descriptor.path, attempt);

	Error::Cancelled
}
