//! Retry eligibility and backoff delays.
//!
//! [`RetryPolicy`] is pure: it looks at an [`ErrorKind`] and an attempt number and never
//! sleeps or touches the network. The executor owns the loop and the waiting.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, error::{ConfigError, ErrorKind}};

const JITTER_SPREAD: f64 = 0.25;

/// Client-wide retry tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
	/// Total attempts per logical request, including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub initial_delay: StdDuration,
	/// Upper bound on computed delays (server-dictated delays are not capped).
	pub max_delay: StdDuration,
	/// Growth factor applied per attempt.
	pub backoff_multiplier: f64,
	/// Spreads computed delays uniformly by up to 25% either way.
	pub jitter: bool,
}
impl RetryOptions {
	/// Overrides the total attempts.
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts;

		self
	}

	/// Overrides the first backoff delay.
	pub fn with_initial_delay(mut self, delay: StdDuration) -> Self {
		self.initial_delay = delay;

		self
	}

	/// Overrides the delay cap.
	pub fn with_max_delay(mut self, delay: StdDuration) -> Self {
		self.max_delay = delay;

		self
	}

	/// Overrides the growth factor.
	pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
		self.backoff_multiplier = multiplier;

		self
	}

	/// Turns jitter on or off.
	pub fn with_jitter(mut self, jitter: bool) -> Self {
		self.jitter = jitter;

		self
	}

	/// Checks the invariants the policy relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidRetryOptions {
				reason: "max_attempts must be at least 1",
			});
		}
		if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1. {
			return Err(ConfigError::InvalidRetryOptions {
				reason: "backoff_multiplier must be finite and at least 1.0",
			});
		}
		if self.initial_delay > self.max_delay {
			return Err(ConfigError::InvalidRetryOptions {
				reason: "initial_delay must not exceed max_delay",
			});
		}

		Ok(())
	}
}
impl Default for RetryOptions {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_delay: StdDuration::from_secs(1),
			max_delay: StdDuration::from_secs(30),
			backoff_multiplier: 2.,
			jitter: true,
		}
	}
}

/// Stateless retry decisions.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryPolicy;
impl RetryPolicy {
	/// Returns `true` when waiting and trying again may succeed.
	pub fn is_retryable(&self, kind: &ErrorKind) -> bool {
		match kind {
			ErrorKind::RateLimited { .. } | ErrorKind::Server { .. } | ErrorKind::Network { .. } =>
				true,
			ErrorKind::Unclassified { status: Some(status) } =>
				*status >= 500 || *status == 408 || *status == 429,
			ErrorKind::Authentication
			| ErrorKind::Authorization
			| ErrorKind::NotFound
			| ErrorKind::Validation
			| ErrorKind::Unclassified { status: None } => false,
		}
	}

	/// Delay to wait after failed `attempt` (1-based) before trying again.
	pub fn delay_for(&self, attempt: u32, kind: &ErrorKind, options: &RetryOptions) -> StdDuration {
		self.delay_for_with_rng(attempt, kind, options, &mut rand::rng())
	}

	/// [`RetryPolicy::delay_for`] drawing jitter from the provided RNG.
	pub fn delay_for_with_rng<R>(
		&self,
		attempt: u32,
		kind: &ErrorKind,
		options: &RetryOptions,
		rng: &mut R,
	) -> StdDuration
	where
		R: Rng,
	{
		if let ErrorKind::RateLimited { retry_after: Some(retry_after), .. } = kind {
			return *retry_after;
		}

		let exponent = i32::try_from(attempt.max(1) - 1).unwrap_or(i32::MAX);
		let cap = options.max_delay.as_nanos() as f64;
		let mut nanos =
			(options.initial_delay.as_nanos() as f64 * options.backoff_multiplier.powi(exponent))
				.min(cap);

		if options.jitter {
			nanos *= 1. + rng.random_range(-JITTER_SPREAD..=JITTER_SPREAD);
		}

		StdDuration::from_nanos(nanos.max(0.).round() as u64)
	}
}
