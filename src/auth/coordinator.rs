//! Hands out currently-valid bearer tokens.
//!
//! [`AuthCoordinator`] composes the [`TokenCache`] and the [`TokenProvider`]. Renewals are
//! single-flight: one async mutex serializes them, and callers that queued behind a winner
//! re-read the cache instead of issuing a second token request.

// self
use crate::{
	_prelude::*,
	auth::{
		cache::TokenCache,
		provider::{AuthorizationRequest, TokenProvider},
		token::{freshness::TokenFreshness, record::Token, secret::Secret},
	},
	clock::{Clock, SystemClock},
	config::{ClientConfig, GrantType},
	error::ApiError,
	obs,
	store::TokenStore,
	transport::HttpTransport,
};

/// Token lifecycle manager shared by every request of one client.
pub struct AuthCoordinator {
	cache: TokenCache,
	provider: TokenProvider,
	clock: Arc<dyn Clock>,
	renew_guard: AsyncMutex<()>,
}
impl AuthCoordinator {
	/// Composes a coordinator from its parts.
	pub fn new(cache: TokenCache, provider: TokenProvider, clock: Arc<dyn Clock>) -> Self {
		Self { cache, provider, clock, renew_guard: AsyncMutex::new(()) }
	}

	/// Builds the cache and provider described by `config`, using the system clock.
	pub fn from_config(
		config: &ClientConfig,
		store: Arc<dyn TokenStore>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		let cache = TokenCache::new(store, config.store_key.clone(), config.freshness);
		let provider = TokenProvider::new(config, transport);

		Self::new(cache, provider, Arc::new(SystemClock))
	}

	/// Replaces the clock used for freshness decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Token cache owned by this coordinator.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Token provider owned by this coordinator.
	pub fn provider(&self) -> &TokenProvider {
		&self.provider
	}

	/// Returns a token that is not expired, obtaining one when necessary.
	pub async fn get_access_token(&self) -> Result<Secret> {
		if let Some(cached) = self.cache.get(self.clock.now()).await {
			return Ok(cached.access_token().clone());
		}

		self.renew(false).await
	}

	/// Returns a usable token, renewing it ahead of time when it is close to expiry.
	pub async fn refresh_if_needed(&self) -> Result<Secret> {
		let now = self.clock.now();

		match self.cache.freshness(now) {
			TokenFreshness::Valid => match self.cache.peek() {
				Some(cached) => Ok(cached.access_token().clone()),
				None => self.get_access_token().await,
			},
			TokenFreshness::NeedsRefresh => self.renew(true).await,
			TokenFreshness::Expired => self.get_access_token().await,
		}
	}

	/// Forgets the current token locally. Idempotent; the server is not contacted.
	pub async fn revoke(&self) -> Result<()> {
		self.cache.clear().await?;

		Ok(())
	}

	/// Forgets a token the resource server rejected.
	///
	/// Store failures are logged, not returned.
	pub async fn invalidate(&self) {
		if let Err(e) = self.cache.clear().await {
			obs::store_degraded("delete", &e);
		}
	}

	/// Exchanges an authorization code and caches the resulting token.
	pub async fn exchange_authorization_code(
		&self,
		code: &str,
		redirect_uri: &Url,
	) -> Result<Secret> {
		let _renewing = self.renew_guard.lock().await;
		let token = self.provider.exchange_authorization_code(code, redirect_uri).await?;

		Ok(self.remember(token).await)
	}

	/// Builds the end-user authorization URL for the authorization-code grant.
	pub fn build_authorization_url(
		&self,
		redirect_uri: &Url,
		state: Option<&str>,
		scope: Option<&[String]>,
	) -> AuthorizationRequest {
		self.provider.build_authorization_url(redirect_uri, state, scope)
	}

	async fn renew(&self, proactive: bool) -> Result<Secret> {
		let _renewing = self.renew_guard.lock().await;

		if let Some(cached) = self.cache.peek() {
			let freshness = cached.freshness_at(self.clock.now(), self.cache.buffers());

			if freshness == TokenFreshness::Valid || (!proactive && freshness.is_usable()) {
				return Ok(cached.access_token().clone());
			}
		}

		let token = self.obtain().await?;

		Ok(self.remember(token).await)
	}

	async fn obtain(&self) -> Result<Token> {
		if self.provider.grant_type() == GrantType::ClientCredentials {
			return self.provider.obtain_client_credentials_token().await;
		}

		match self.cache.peek().and_then(|cached| cached.refresh_token().cloned()) {
			Some(refresh_token) => self.provider.refresh_token_grant(&refresh_token).await,
			None => Err(ApiError::authentication(
				"No usable token is cached; complete the authorization-code exchange first.",
			)
			.into()),
		}
	}

	async fn remember(&self, token: Token) -> Secret {
		let access_token = token.access_token.clone();

		if let Err(e) = self.cache.put(token, self.clock.now()).await {
			obs::store_degraded("save", &e);
		}

		access_token
	}
}
impl Debug for AuthCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthCoordinator")
			.field("cache", &self.cache)
			.field("provider", &self.provider)
			.finish()
	}
}
