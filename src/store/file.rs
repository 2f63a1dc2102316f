//! Simple file-backed [`TokenStore`] for CLIs and long-lived daemons that should survive
//! restarts without re-authenticating.

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, TokenStore},
};

/// Persists serialized tokens to a JSON object file after each mutation.
///
/// Mutations are serialized and written with async file IO. When a write fails the
/// in-memory map is rolled back, so memory never claims more than disk holds.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<String, String>>>,
	writer: Arc<AsyncMutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		if let Some(parent) = parent_dir(&path) {
			fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
		}

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			writer: Arc::new(AsyncMutex::new(())),
		})
	}

	/// Path of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<String, String>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	async fn persist(&self, contents: &HashMap<String, String>) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		if let Some(parent) = parent_dir(&self.path) {
			tokio::fs::create_dir_all(parent).await.map_err(|e| create_dir_error(parent, e))?;
		}

		tokio::fs::write(&tmp_path, serialized).await.map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		tokio::fs::OpenOptions::new()
			.write(true)
			.open(&tmp_path)
			.await
			.map_err(|e| StoreError::Backend {
				message: format!("Failed to open {}: {e}", tmp_path.display()),
			})?
			.sync_all()
			.await
			.map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	async fn persist_or_restore(
		&self,
		key: &str,
		previous: Option<String>,
	) -> Result<(), StoreError> {
		let snapshot = self.inner.read().clone();
		let result = self.persist(&snapshot).await;

		if result.is_err() {
			let mut map = self.inner.write();

			match previous {
				Some(previous) => map.insert(key.to_owned(), previous),
				None => map.remove(key),
			};
		}

		result
	}
}
impl TokenStore for FileStore {
	fn load<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn save<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let _writing = self.writer.lock().await;
			let previous = self.inner.write().insert(key.to_owned(), value);

			self.persist_or_restore(key, previous).await
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let _writing = self.writer.lock().await;
			let removed = self.inner.write().remove(key);

			match removed {
				Some(previous) => self.persist_or_restore(key, Some(previous)).await,
				None => Ok(()),
			}
		})
	}
}

fn parent_dir(path: &Path) -> Option<&Path> {
	path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

fn create_dir_error(dir: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend {
		message: format!("Failed to create store directory {}: {e}", dir.display()),
	}
}
