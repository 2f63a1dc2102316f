//! Thread-safe in-memory [`TokenStore`] implementation for single-process clients and tests.

// self
use crate::{
	_prelude::*,
	store::{StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Storage backend that keeps serialized tokens in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Reads an entry synchronously; handy for assertions.
	pub fn get(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	/// Writes an entry synchronously; handy for seeding fixtures.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
		self.0.write().insert(key.into(), value.into());
	}
}
impl TokenStore for MemoryStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}
