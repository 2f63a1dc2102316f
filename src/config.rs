//! Client configuration: where to send requests, how to authenticate, and how hard to retry.
//!
//! [`ClientConfig`] is immutable once built. [`ClientConfigBuilder::build`] validates every
//! invariant up front (absolute base URL, credentials matching the grant, retry bounds,
//! freshness buffers) so the runtime layers never have to re-check them.

// self
use crate::{_prelude::*, auth::FreshnessBuffers, error::ConfigError, retry::RetryOptions};

const DEFAULT_TOKEN_PATH: &str = "oauth/token";
const DEFAULT_AUTHORIZATION_PATH: &str = "oauth/authorize";

/// OAuth 2.0 grant types understood by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Client Credentials grant for machine-to-machine tokens.
	#[default]
	ClientCredentials,
	/// Authorization Code grant; tokens come from a one-shot code exchange.
	AuthorizationCode,
	/// Refresh Token grant used to renew authorization-code tokens.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How the client proves its identity to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Form POST body parameters for `client_id`/`client_secret`.
	#[default]
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
}

/// Authorization server endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// Token endpoint used for every grant.
	pub token: Url,
	/// Authorization endpoint used to build end-user redirect URLs.
	pub authorization: Url,
}

/// Validated client configuration.
#[derive(Clone)]
pub struct ClientConfig {
	/// Base URL every resource path is appended to.
	pub base_url: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Optional client secret; required for the client-credentials grant.
	pub client_secret: Option<String>,
	/// Grant the client uses to obtain tokens.
	pub grant_type: GrantType,
	/// Token and authorization endpoints (explicit or derived from the base URL).
	pub endpoints: Endpoints,
	/// Token endpoint client authentication method.
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested for every token.
	pub scopes: Vec<String>,
	/// Client-wide retry defaults.
	pub retry: RetryOptions,
	/// Default per-attempt timeout for resource and token calls.
	pub request_timeout: Option<StdDuration>,
	/// Token freshness buffers.
	pub freshness: FreshnessBuffers,
	/// Key under which the token is persisted in the token store.
	pub store_key: String,
}
impl ClientConfig {
	/// Creates a builder for the provided base URL and client identifier.
	pub fn builder(base_url: Url, client_id: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url, client_id)
	}

	/// Returns the configured scopes joined with spaces, if any.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() { None } else { Some(self.scopes.join(" ")) }
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("base_url", &self.base_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("grant_type", &self.grant_type)
			.field("endpoints", &self.endpoints)
			.field("client_auth_method", &self.client_auth_method)
			.field("scopes", &self.scopes)
			.field("retry", &self.retry)
			.field("request_timeout", &self.request_timeout)
			.field("freshness", &self.freshness)
			.field("store_key", &self.store_key)
			.finish()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	client_id: String,
	client_secret: Option<String>,
	grant_type: GrantType,
	token_endpoint: Option<Url>,
	authorization_endpoint: Option<Url>,
	client_auth_method: ClientAuthMethod,
	scopes: Vec<String>,
	retry: RetryOptions,
	request_timeout: Option<StdDuration>,
	freshness: Option<(Duration, Duration)>,
	store_key: Option<String>,
}
impl ClientConfigBuilder {
	fn new(base_url: Url, client_id: impl Into<String>) -> Self {
		Self {
			base_url,
			client_id: client_id.into(),
			client_secret: None,
			grant_type: GrantType::default(),
			token_endpoint: None,
			authorization_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
			scopes: Vec::new(),
			retry: RetryOptions::default(),
			request_timeout: None,
			freshness: None,
			store_key: None,
		}
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the grant type (defaults to client credentials).
	pub fn grant_type(mut self, grant: GrantType) -> Self {
		self.grant_type = grant;

		self
	}

	/// Overrides the token endpoint (defaults to `<base_url>/oauth/token`).
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the authorization endpoint (defaults to `<base_url>/oauth/authorize`).
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Overrides the token endpoint client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Adds a scope requested for every token.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scopes.push(scope.into());

		self
	}

	/// Adds multiple scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Replaces the client-wide retry options.
	pub fn retry_options(mut self, retry: RetryOptions) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides only the default maximum attempts.
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.retry.max_attempts = attempts;

		self
	}

	/// Sets the default per-attempt timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the hard-expiry (`validity`) and proactive refresh (`refresh`) buffers.
	pub fn freshness_buffers(mut self, validity: Duration, refresh: Duration) -> Self {
		self.freshness = Some((validity, refresh));

		self
	}

	/// Overrides the token store key (defaults to `oauth2-courier:<client_id>`).
	pub fn store_key(mut self, key: impl Into<String>) -> Self {
		self.store_key = Some(key.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		validate_base_url(&self.base_url)?;

		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.grant_type == GrantType::ClientCredentials
			&& self.client_secret.as_deref().is_none_or(str::is_empty)
		{
			return Err(ConfigError::MissingClientSecret { grant: self.grant_type });
		}

		self.retry.validate()?;

		let freshness = match self.freshness {
			Some((validity, refresh)) => FreshnessBuffers::new(validity, refresh)?,
			None => FreshnessBuffers::default(),
		};
		let token = match self.token_endpoint {
			Some(url) => url,
			None => derive_endpoint(&self.base_url, DEFAULT_TOKEN_PATH)?,
		};
		let authorization = match self.authorization_endpoint {
			Some(url) => url,
			None => derive_endpoint(&self.base_url, DEFAULT_AUTHORIZATION_PATH)?,
		};
		let store_key =
			self.store_key.unwrap_or_else(|| format!("oauth2-courier:{}", self.client_id));

		Ok(ClientConfig {
			base_url: self.base_url,
			client_id: self.client_id,
			client_secret: self.client_secret,
			grant_type: self.grant_type,
			endpoints: Endpoints { token, authorization },
			client_auth_method: self.client_auth_method,
			scopes: self.scopes,
			retry: self.retry,
			request_timeout: self.request_timeout,
			freshness,
			store_key,
		})
	}
}

/// Appends `path` to the base URL's path, keeping any prefix such as `/v1`.
pub(crate) fn join_path(base: &Url, path: &str) -> Url {
	let mut url = base.clone();
	let joined =
		format!("{}/{}", base.path().trim_end_matches('/'), path.trim_start_matches('/'));

	url.set_path(&joined);
	url.set_query(None);

	url
}

fn derive_endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let url = join_path(base, path);

	validate_base_url(&url)?;

	Ok(url)
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() {
		Ok(())
	} else {
		Err(ConfigError::InvalidBaseUrl { url: url.to_string() })
	}
}
