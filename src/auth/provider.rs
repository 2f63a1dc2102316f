//! Authorization-server client.
//!
//! [`TokenProvider`] performs the token grants this crate supports and builds end-user
//! authorization URLs. Every failure to get a usable token (network, non-2xx status,
//! malformed body, missing `access_token`/`expires_in`) is reported as an
//! [`ErrorKind::Authentication`] [`ApiError`] with the status and the cause attached.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use http::{
	HeaderValue, Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use rand::Rng;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::token::{record::Token, secret::Secret},
	classify,
	config::{ClientAuthMethod, ClientConfig, Endpoints, GrantType},
	error::{ApiError, ConfigError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	transport::{self, HttpRequest, HttpTransport},
};

const STATE_BYTES: usize = 32;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// End-user authorization URL plus the `state` value the redirect must echo back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// URL the end user should visit.
	pub url: Url,
	/// Opaque value to compare against the redirect's `state` parameter.
	pub state: String,
}
impl AuthorizationRequest {
	/// Returns `true` when the redirect echoed the expected `state`.
	pub fn state_matches(&self, returned_state: &str) -> bool {
		self.state == returned_state
	}
}

/// Token endpoint client for one configured OAuth 2.0 client.
pub struct TokenProvider {
	transport: Arc<dyn HttpTransport>,
	endpoints: Endpoints,
	client_id: String,
	client_secret: Option<Secret>,
	grant_type: GrantType,
	auth_method: ClientAuthMethod,
	scope: Option<String>,
	timeout: Option<StdDuration>,
}
impl TokenProvider {
	/// Creates a provider from a validated configuration.
	pub fn new(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
		Self {
			transport,
			endpoints: config.endpoints.clone(),
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone().map(Secret::new),
			grant_type: config.grant_type,
			auth_method: config.client_auth_method,
			scope: config.scope_param(),
			timeout: config.request_timeout,
		}
	}

	/// Grant the provider was configured for.
	pub fn grant_type(&self) -> GrantType {
		self.grant_type
	}

	/// Performs the client-credentials grant.
	pub async fn obtain_client_credentials_token(&self) -> Result<Token> {
		const GRANT: GrantType = GrantType::ClientCredentials;

		self.ensure_grant(GRANT)?;

		let mut form = vec![("grant_type", GRANT.as_str().to_owned())];

		if let Some(scope) = &self.scope {
			form.push(("scope", scope.clone()));
		}

		self.request_token(GRANT, form).await
	}

	/// Exchanges a one-shot authorization code for a token.
	pub async fn exchange_authorization_code(
		&self,
		code: &str,
		redirect_uri: &Url,
	) -> Result<Token> {
		const GRANT: GrantType = GrantType::AuthorizationCode;

		self.ensure_grant(GRANT)?;

		let form = vec![
			("grant_type", GRANT.as_str().to_owned()),
			("code", code.to_owned()),
			("redirect_uri", redirect_uri.to_string()),
		];

		self.request_token(GRANT, form).await
	}

	/// Renews a token with a refresh token.
	///
	/// The previous refresh token is kept when the server does not rotate it.
	pub async fn refresh_token_grant(&self, refresh_token: &Secret) -> Result<Token> {
		const GRANT: GrantType = GrantType::RefreshToken;

		let mut form = vec![
			("grant_type", GRANT.as_str().to_owned()),
			("refresh_token", refresh_token.expose().to_owned()),
		];

		if let Some(scope) = &self.scope {
			form.push(("scope", scope.clone()));
		}

		let mut token = self.request_token(GRANT, form).await?;

		if token.refresh_token.is_none() {
			token.refresh_token = Some(refresh_token.clone());
		}

		Ok(token)
	}

	/// Builds the end-user authorization URL.
	///
	/// A random `state` is generated when none is supplied; `scope` falls back to the
	/// configured scopes.
	pub fn build_authorization_url(
		&self,
		redirect_uri: &Url,
		state: Option<&str>,
		scope: Option<&[String]>,
	) -> AuthorizationRequest {
		let state = state.map_or_else(random_state, str::to_owned);
		let scope = scope.map(|scope| scope.join(" ")).or_else(|| self.scope.clone());
		let mut url = self.endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.client_id);
		pairs.append_pair("redirect_uri", redirect_uri.as_str());

		if let Some(scope) = scope.filter(|scope| !scope.is_empty()) {
			pairs.append_pair("scope", &scope);
		}

		pairs.append_pair("state", &state);

		drop(pairs);

		AuthorizationRequest { url, state }
	}

	fn ensure_grant(&self, requested: GrantType) -> Result<(), ConfigError> {
		if self.grant_type == requested {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant { configured: self.grant_type, requested })
		}
	}

	async fn request_token(
		&self,
		grant: GrantType,
		form: Vec<(&'static str, String)>,
	) -> Result<Token> {
		let kind = FlowKind::from(grant);
		let span = FlowSpan::new(kind, "token_request");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span.instrument(self.send_token_request(grant, form)).await;

		match &result {
			Ok(token) => {
				obs::token_issued(grant, token.expires_in);
				obs::record_flow_outcome(kind, FlowOutcome::Success);
			},
			Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
		}

		result
	}

	async fn send_token_request(
		&self,
		grant: GrantType,
		mut form: Vec<(&'static str, String)>,
	) -> Result<Token> {
		let mut builder = http::Request::builder()
			.method(Method::POST)
			.uri(self.endpoints.token.as_str())
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(ACCEPT, "application/json");

		match (self.auth_method, &self.client_secret) {
			(ClientAuthMethod::ClientSecretBasic, Some(secret)) => {
				let credentials = format!(
					"{}:{}",
					form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect::<String>(),
					form_urlencoded::byte_serialize(secret.expose().as_bytes()).collect::<String>(),
				);
				let mut value =
					HeaderValue::try_from(format!("Basic {}", STANDARD.encode(credentials)))
						.map_err(ConfigError::from)?;

				value.set_sensitive(true);

				builder = builder.header(AUTHORIZATION, value);
			},
			(_, secret) => {
				form.push(("client_id", self.client_id.clone()));

				if let Some(secret) = secret {
					form.push(("client_secret", secret.expose().to_owned()));
				}
			},
		}

		let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();
		let request: HttpRequest =
			builder.body(body.into_bytes()).map_err(ConfigError::from)?;
		let response = transport::send_with_timeout(self.transport.as_ref(), request, self.timeout)
			.await
			.map_err(|e| {
				ApiError::authentication(format!(
					"Token request for the {grant} grant could not reach the token endpoint."
				))
				.with_source(e)
			})?;
		let status = response.status();

		if !status.is_success() {
			let message = classify::response_message(status, response.body());

			return Err(ApiError::authentication(format!(
				"Token endpoint rejected the {grant} grant: {message}."
			))
			.with_status(status.as_u16())
			.into());
		}

		parse_token_response(response.body()).map_err(|e| e.with_status(status.as_u16()).into())
	}
}
impl Debug for TokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("endpoints", &self.endpoints)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("grant_type", &self.grant_type)
			.field("auth_method", &self.auth_method)
			.field("scope", &self.scope)
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	scope: Option<String>,
}

fn parse_token_response(body: &[u8]) -> Result<Token, ApiError> {
	let deserializer = &mut serde_json::Deserializer::from_slice(body);
	let response: TokenResponse = serde_path_to_error::deserialize(deserializer).map_err(|e| {
		ApiError::authentication("Token response could not be decoded.").with_source(e)
	})?;
	let access_token = response
		.access_token
		.map(Secret::from)
		.filter(|token| !token.is_blank())
		.ok_or_else(|| ApiError::authentication("Token response is missing `access_token`."))?;
	let expires_in = response.expires_in.ok_or_else(|| {
		ApiError::authentication("Token response is missing `expires_in`.")
	})?;

	if expires_in <= 0 {
		return Err(ApiError::authentication(format!(
			"Token response carries a non-positive `expires_in` ({expires_in})."
		)));
	}

	let token_type = response
		.token_type
		.filter(|value| !value.trim().is_empty())
		.unwrap_or_else(|| Token::DEFAULT_TYPE.to_owned());
	let refresh_token =
		response.refresh_token.map(Secret::from).filter(|refresh_token| !refresh_token.is_blank());

	Ok(Token { access_token, token_type, expires_in, refresh_token, scope: response.scope })
}

fn random_state() -> String {
	let mut bytes = [0_u8; STATE_BYTES];

	rand::rng().fill(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{error::ErrorKind, transport::{HttpResponse, TransportFuture}};

	struct FixedTransport {
		status: u16,
		body: &'static str,
		seen: Mutex<Vec<(http::HeaderMap, String)>>,
	}
	impl FixedTransport {
		fn new(status: u16, body: &'static str) -> Arc<Self> {
			Arc::new(Self { status, body, seen: Mutex::default() })
		}

		fn calls(&self) -> usize {
			self.seen.lock().len()
		}

		fn last_body(&self) -> String {
			self.seen.lock().last().map(|(_, body)| body.clone()).unwrap_or_default()
		}
	}
	impl HttpTransport for FixedTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			let (parts, body) = request.into_parts();

			self.seen
				.lock()
				.push((parts.headers, String::from_utf8(body).expect("Form body should be UTF-8.")));

			let response: HttpResponse = http::Response::builder()
				.status(self.status)
				.body(self.body.as_bytes().to_vec())
				.expect("Response fixture should build.");

			Box::pin(async move { Ok(response) })
		}
	}

	fn config(grant: GrantType, method: ClientAuthMethod) -> ClientConfig {
		ClientConfig::builder(
			Url::parse("https://api.example.com").expect("Base URL should parse."),
			"client-1",
		)
		.client_secret("s3cr3t")
		.grant_type(grant)
		.client_auth_method(method)
		.scopes(["read", "write"])
		.build()
		.expect("Config fixture should build.")
	}

	fn redirect() -> Url {
		Url::parse("https://app.example.com/callback").expect("Redirect URI should parse.")
	}

	#[tokio::test]
	async fn client_credentials_posts_form_credentials() {
		let transport =
			FixedTransport::new(200, r#"{"access_token":"t1","expires_in":3600,"scope":"read"}"#);
		let provider = TokenProvider::new(
			&config(GrantType::ClientCredentials, ClientAuthMethod::ClientSecretPost),
			transport.clone(),
		);
		let token = provider
			.obtain_client_credentials_token()
			.await
			.expect("Client credentials grant should succeed.");

		assert_eq!(token.access_token.expose(), "t1");
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.expires_in, 3_600);
		assert_eq!(token.scope.as_deref(), Some("read"));
		assert_eq!(
			transport.last_body(),
			"grant_type=client_credentials&scope=read+write&client_id=client-1&client_secret=s3cr3t"
		);
	}

	#[tokio::test]
	async fn basic_auth_moves_credentials_into_the_header() {
		let transport = FixedTransport::new(200, r#"{"access_token":"t1","expires_in":60}"#);
		let provider = TokenProvider::new(
			&config(GrantType::ClientCredentials, ClientAuthMethod::ClientSecretBasic),
			transport.clone(),
		);

		provider.obtain_client_credentials_token().await.expect("Grant should succeed.");

		let seen = transport.seen.lock();
		let (headers, body) = seen.last().expect("One request should be recorded.");

		assert_eq!(
			headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some(format!("Basic {}", STANDARD.encode("client-1:s3cr3t")).as_str())
		);
		assert!(!body.contains("client_secret"));
	}

	#[tokio::test]
	async fn malformed_token_responses_are_authentication_errors() {
		for body in [
			r#"{"access_token":"t1"}"#,
			r#"{"access_token":"","expires_in":60}"#,
			r#"{"access_token":"   ","expires_in":60}"#,
			r#"{"access_token":"t1","expires_in":0}"#,
			r#"{"access_token":"t1","expires_in":"soon"}"#,
			"not json",
		] {
			let transport = FixedTransport::new(200, body);
			let provider = TokenProvider::new(
				&config(GrantType::ClientCredentials, ClientAuthMethod::ClientSecretPost),
				transport,
			);
			let err = provider
				.obtain_client_credentials_token()
				.await
				.expect_err("Malformed token response should fail.");

			assert_eq!(err.kind(), Some(&ErrorKind::Authentication), "body: {body}");
			assert_eq!(err.status(), Some(200));
		}
	}

	#[tokio::test]
	async fn rejected_grants_carry_status_and_description() {
		let transport = FixedTransport::new(
			401,
			r#"{"error":"invalid_client","error_description":"unknown client"}"#,
		);
		let provider = TokenProvider::new(
			&config(GrantType::ClientCredentials, ClientAuthMethod::ClientSecretPost),
			transport,
		);
		let err = provider
			.obtain_client_credentials_token()
			.await
			.expect_err("Rejected grant should fail.");

		assert_eq!(err.kind(), Some(&ErrorKind::Authentication));
		assert_eq!(err.status(), Some(401));
		assert!(err.to_string().contains("unknown client"));
	}

	#[tokio::test]
	async fn mismatched_grants_fail_before_any_network_call() {
		let transport = FixedTransport::new(200, r#"{"access_token":"t1","expires_in":60}"#);
		let provider = TokenProvider::new(
			&config(GrantType::ClientCredentials, ClientAuthMethod::ClientSecretPost),
			transport.clone(),
		);
		let err = provider
			.exchange_authorization_code("code-1", &redirect())
			.await
			.expect_err("Authorization code exchange should be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::UnsupportedGrant {
				configured: GrantType::ClientCredentials,
				requested: GrantType::AuthorizationCode,
			})
		));
		assert_eq!(transport.calls(), 0);
	}

	#[tokio::test]
	async fn refresh_keeps_an_unrotated_refresh_token() {
		let transport = FixedTransport::new(
			200,
			r#"{"access_token":"t2","expires_in":60,"refresh_token":" ","token_type":""}"#,
		);
		let provider = TokenProvider::new(
			&config(GrantType::AuthorizationCode, ClientAuthMethod::ClientSecretPost),
			transport.clone(),
		);
		let token = provider
			.refresh_token_grant(&Secret::new("r1"))
			.await
			.expect("Refresh grant should succeed.");

		assert_eq!(token.refresh_token, Some(Secret::new("r1")));
		assert_eq!(token.token_type, Token::DEFAULT_TYPE);
		assert!(transport.last_body().starts_with("grant_type=refresh_token&refresh_token=r1"));
	}

	#[test]
	fn authorization_urls_carry_a_random_state() {
		let provider = TokenProvider::new(
			&config(GrantType::AuthorizationCode, ClientAuthMethod::ClientSecretPost),
			FixedTransport::new(200, "{}"),
		);
		let first = provider.build_authorization_url(&redirect(), None, None);
		let second = provider.build_authorization_url(&redirect(), None, None);

		assert_eq!(first.state.len(), 43);
		assert_ne!(first.state, second.state);
		assert!(first.state_matches(&first.state.clone()));

		let pairs = first.url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(first.url.path(), "/oauth/authorize");
		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(
			pairs.get("redirect_uri").map(String::as_str),
			Some("https://app.example.com/callback")
		);
		assert_eq!(pairs.get("scope").map(String::as_str), Some("read write"));
		assert_eq!(pairs.get("state"), Some(&first.state));

		let scope = ["admin".to_owned()];
		let explicit = provider.build_authorization_url(&redirect(), Some("fixed"), Some(&scope[..]));

		assert_eq!(explicit.state, "fixed");
		assert!(explicit.url.as_str().contains("scope=admin"));

		let unscoped =
			provider.build_authorization_url(&redirect(), Some("fixed"), Some(&[][..]));

		assert!(!unscoped.url.as_str().contains("scope="));
	}
}
