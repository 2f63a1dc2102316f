//! Single-slot token cache backed by a [`TokenStore`].

// self
use crate::{
	_prelude::*,
	auth::token::{
		freshness::{FreshnessBuffers, TokenFreshness},
		record::{CachedToken, Token},
	},
	obs,
	store::{StoreError, TokenStore},
};

/// Most recent token for one client, mirrored to a durable store.
///
/// The in-memory slot is authoritative for this process; the store only seeds it after a
/// restart. Tokens enter through [`TokenCache::put`] and leave through
/// [`TokenCache::clear`]. No network I/O happens here.
pub struct TokenCache {
	store: Arc<dyn TokenStore>,
	key: String,
	buffers: FreshnessBuffers,
	slot: Mutex<Option<CachedToken>>,
}
impl TokenCache {
	/// Creates an empty cache persisting under `key`.
	pub fn new(
		store: Arc<dyn TokenStore>,
		key: impl Into<String>,
		buffers: FreshnessBuffers,
	) -> Self {
		Self { store, key: key.into(), buffers, slot: Mutex::new(None) }
	}

	/// Store key used for persistence.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Freshness buffers used for every decision.
	pub fn buffers(&self) -> &FreshnessBuffers {
		&self.buffers
	}

	/// Returns a usable token, falling back to the store when memory has none.
	///
	/// Persisted entries that are expired or cannot be decoded are deleted and read as
	/// "no token". Store failures degrade to "no token" as well.
	pub async fn get(&self, now: OffsetDateTime) -> Option<CachedToken> {
		if let Some(cached) = self.usable(now) {
			return Some(cached);
		}

		let raw = match self.store.load(&self.key).await {
			Ok(Some(raw)) => raw,
			Ok(None) => return None,
			Err(e) => {
				obs::store_degraded("load", &e);

				return None;
			},
		};

		match serde_json::from_str::<CachedToken>(&raw) {
			Ok(cached) if cached.freshness_at(now, &self.buffers).is_usable() => {
				*self.slot.lock() = Some(cached.clone());

				Some(cached)
			},
			Ok(cached) => {
				obs::stored_token_discarded(&self.key, "expired");

				// Keep the refresh token reachable through `peek`.
				if cached.refresh_token().is_some() {
					let mut slot = self.slot.lock();

					if slot.is_none() {
						*slot = Some(cached);
					}
				}

				self.discard().await;

				None
			},
			Err(e) => {
				obs::stored_token_discarded(&self.key, &e.to_string());
				self.discard().await;

				None
			},
		}
	}

	/// Stamps `token` with `now`, replaces the in-memory copy, and persists it.
	///
	/// The in-memory copy is replaced even when the store write fails.
	pub async fn put(&self, token: Token, now: OffsetDateTime) -> Result<CachedToken, StoreError> {
		let cached = CachedToken::new(token, now);

		*self.slot.lock() = Some(cached.clone());

		let serialized = serde_json::to_string(&cached)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.store.save(&self.key, serialized).await?;

		Ok(cached)
	}

	/// Drops the in-memory token and deletes the persisted entry. Idempotent.
	pub async fn clear(&self) -> Result<(), StoreError> {
		self.slot.lock().take();
		self.store.delete(&self.key).await
	}

	/// Freshness of the in-memory token; an empty slot reads as expired.
	pub fn freshness(&self, now: OffsetDateTime) -> TokenFreshness {
		self.slot
			.lock()
			.as_ref()
			.map_or(TokenFreshness::Expired, |cached| cached.freshness_at(now, &self.buffers))
	}

	/// In-memory token regardless of freshness.
	pub fn peek(&self) -> Option<CachedToken> {
		self.slot.lock().clone()
	}

	fn usable(&self, now: OffsetDateTime) -> Option<CachedToken> {
		self.slot
			.lock()
			.as_ref()
			.filter(|cached| cached.freshness_at(now, &self.buffers).is_usable())
			.cloned()
	}

	async fn discard(&self) {
		if let Err(e) = self.store.delete(&self.key).await {
			obs::store_degraded("delete", &e);
		}
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("key", &self.key)
			.field("buffers", &self.buffers)
			.field("cached", &self.slot.lock().is_some())
			.finish()
	}
}
