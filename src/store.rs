//! Storage contracts and built-in token store implementations.
//!
//! A [`TokenStore`] is a plain key -> serialized-token map. It knows nothing about
//! expiry or freshness; [`crate::auth::TokenCache`] owns those rules and treats the
//! store as durable backing for its single in-memory slot.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable key -> serialized-token persistence.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Loads the serialized token stored under `key`, if any.
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Persists or replaces the serialized token stored under `key`.
	fn save<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes the entry stored under `key`. Deleting a missing key succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
