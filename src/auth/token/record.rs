//! Issued tokens and their cached, expiry-stamped form.

// self
use crate::{
	_prelude::*,
	auth::token::{
		freshness::{FreshnessBuffers, TokenFreshness},
		secret::Secret,
	},
};

const MILLIS_PER_SECOND: i64 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Token as issued by the authorization server. Immutable once issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: Secret,
	/// Token type reported by the server (almost always `Bearer`).
	#[serde(default = "Token::default_type")]
	pub token_type: String,
	/// Lifetime in seconds, relative to the moment the token was obtained.
	pub expires_in: i64,
	/// Refresh token, if the server issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<Secret>,
	/// Space-delimited scopes granted, if reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl Token {
	/// Token type assumed when the server does not report one.
	pub const DEFAULT_TYPE: &'static str = "Bearer";

	/// Creates a bearer token with the provided lifetime in seconds.
	pub fn bearer(access_token: impl Into<String>, expires_in: i64) -> Self {
		Self {
			access_token: Secret::new(access_token),
			token_type: Self::DEFAULT_TYPE.to_owned(),
			expires_in,
			refresh_token: None,
			scope: None,
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(Secret::new(refresh_token));

		self
	}

	/// Attaches the granted scope string.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Lifetime as a [`Duration`].
	pub fn lifetime(&self) -> Duration {
		Duration::seconds(self.expires_in)
	}

	fn default_type() -> String {
		Self::DEFAULT_TYPE.into()
	}
}

/// Failures raised while restoring a [`CachedToken`] from its serialized form.
#[derive(Debug, ThisError)]
pub enum CachedTokenError {
	/// Stored epoch milliseconds cannot be represented.
	#[error("Stored timestamp {0} ms is out of range.")]
	TimestampOutOfRange(i64),
	/// Stored expiry disagrees with `obtained_at + expires_in`.
	#[error("Stored expiry {stored} ms does not match the derived expiry {derived} ms.")]
	ExpiryMismatch {
		/// Expiry found in the stored entry.
		stored: i64,
		/// Expiry derived from the obtained-at instant and the token lifetime.
		derived: i64,
	},
}

/// Token plus the instant it was obtained and the expiry derived from it.
///
/// The expiry is computed once, in [`CachedToken::new`], and is never set independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredToken", into = "StoredToken")]
pub struct CachedToken {
	token: Token,
	obtained_at: OffsetDateTime,
	expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Stamps a token with the instant it was obtained.
	pub fn new(token: Token, obtained_at: OffsetDateTime) -> Self {
		let expires_at = obtained_at.saturating_add(token.lifetime());

		Self { token, obtained_at, expires_at }
	}

	/// Issued token.
	pub fn token(&self) -> &Token {
		&self.token
	}

	/// Access token secret.
	pub fn access_token(&self) -> &Secret {
		&self.token.access_token
	}

	/// Refresh token secret, if any.
	pub fn refresh_token(&self) -> Option<&Secret> {
		self.token.refresh_token.as_ref()
	}

	/// Instant the token was obtained.
	pub fn obtained_at(&self) -> OffsetDateTime {
		self.obtained_at
	}

	/// Instant the token expires.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Freshness relative to `now`.
	pub fn freshness_at(&self, now: OffsetDateTime, buffers: &FreshnessBuffers) -> TokenFreshness {
		buffers.classify(self.expires_at - now)
	}

	/// Unwraps the issued token.
	pub fn into_token(self) -> Token {
		self.token
	}
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
	#[serde(flatten)]
	token: Token,
	obtained_at_ms: i64,
	expires_at_ms: i64,
}
impl From<CachedToken> for StoredToken {
	fn from(cached: CachedToken) -> Self {
		Self {
			obtained_at_ms: epoch_millis(cached.obtained_at),
			expires_at_ms: epoch_millis(cached.expires_at),
			token: cached.token,
		}
	}
}
impl TryFrom<StoredToken> for CachedToken {
	type Error = CachedTokenError;

	fn try_from(stored: StoredToken) -> Result<Self, Self::Error> {
		let derived = stored
			.token
			.expires_in
			.checked_mul(MILLIS_PER_SECOND)
			.and_then(|lifetime| stored.obtained_at_ms.checked_add(lifetime))
			.ok_or(CachedTokenError::TimestampOutOfRange(stored.obtained_at_ms))?;

		if derived != stored.expires_at_ms {
			return Err(CachedTokenError::ExpiryMismatch { stored: stored.expires_at_ms, derived });
		}

		let obtained_at = from_epoch_millis(stored.obtained_at_ms)?;

		Ok(Self::new(stored.token, obtained_at))
	}
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / NANOS_PER_MILLI;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}

fn from_epoch_millis(millis: i64) -> Result<OffsetDateTime, CachedTokenError> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
		.map_err(|_| CachedTokenError::TimestampOutOfRange(millis))
}
