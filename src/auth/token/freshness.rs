//! Freshness classification for cached tokens.

// self
use crate::{_prelude::*, error::ConfigError};

/// How usable a cached token is at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenFreshness {
	/// Expiry is further away than the refresh buffer.
	Valid,
	/// Expiry is inside the refresh buffer but beyond the validity buffer; still usable, but a
	/// replacement should be fetched now.
	NeedsRefresh,
	/// Expiry is inside the validity buffer or already past; must not be sent.
	Expired,
}
impl TokenFreshness {
	/// Returns `true` unless the token is [`TokenFreshness::Expired`].
	pub const fn is_usable(self) -> bool {
		!matches!(self, Self::Expired)
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Valid => "valid",
			Self::NeedsRefresh => "needs_refresh",
			Self::Expired => "expired",
		}
	}
}
impl Display for TokenFreshness {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Hard-expiry (`validity`) and proactive-refresh (`refresh`) buffers.
///
/// Construction enforces `0 <= validity < refresh`, so a token always passes through
/// [`TokenFreshness::NeedsRefresh`] before it becomes [`TokenFreshness::Expired`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessBuffers {
	validity: Duration,
	refresh: Duration,
}
impl FreshnessBuffers {
	/// Default hard-expiry buffer.
	pub const DEFAULT_VALIDITY: Duration = Duration::minutes(5);
	/// Default proactive refresh buffer.
	pub const DEFAULT_REFRESH: Duration = Duration::minutes(10);

	/// Creates validated buffers.
	pub fn new(validity: Duration, refresh: Duration) -> Result<Self, ConfigError> {
		if validity.is_negative() || validity >= refresh {
			return Err(ConfigError::InvalidFreshnessBuffers { validity, refresh });
		}

		Ok(Self { validity, refresh })
	}

	/// Hard-expiry buffer.
	pub fn validity(&self) -> Duration {
		self.validity
	}

	/// Proactive refresh buffer.
	pub fn refresh(&self) -> Duration {
		self.refresh
	}

	/// Classifies a token by the time left until its expiry instant.
	pub fn classify(&self, remaining: Duration) -> TokenFreshness {
		if remaining <= self.validity {
			TokenFreshness::Expired
		} else if remaining <= self.refresh {
			TokenFreshness::NeedsRefresh
		} else {
			TokenFreshness::Valid
		}
	}
}
impl Default for FreshnessBuffers {
	fn default() -> Self {
		Self { validity: Self::DEFAULT_VALIDITY, refresh: Self::DEFAULT_REFRESH }
	}
}
