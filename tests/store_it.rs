mod common;

// std
use std::{env, fs, path::PathBuf, process, sync::Arc};
// self
use common::ScriptedTransport;
use oauth2_courier::{
	auth::{AuthCoordinator, CachedToken},
	store::{FileStore, MemoryStore, TokenStore},
};

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"oauth2_courier_{label}_{}_{}.json",
		process::id(),
		time::OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

#[tokio::test]
async fn file_store_survives_a_restart() {
	let path = temp_path("restart");
	let config = common::config(3);
	let transport = ScriptedTransport::new([]);
	let first = AuthCoordinator::from_config(
		&config,
		Arc::new(FileStore::open(&path).expect("File store should open.")),
		transport.clone(),
	);

	assert_eq!(first.get_access_token().await.expect("Token should be issued.").expose(), "t1");

	drop(first);

	let store = FileStore::open(&path).expect("File store should reopen.");
	let raw = store
		.load(&config.store_key)
		.await
		.expect("Load should succeed.")
		.expect("Token should be persisted.");
	let persisted: CachedToken = serde_json::from_str(&raw).expect("Entry should decode.");

	assert_eq!(persisted.access_token().expose(), "t1");

	let restarted = AuthCoordinator::from_config(&config, Arc::new(store), transport.clone());

	assert_eq!(restarted.get_access_token().await.expect("Persisted token.").expose(), "t1");
	assert_eq!(transport.token_calls(), 1);

	restarted.revoke().await.expect("Revoke should succeed.");

	let reopened = FileStore::open(&path).expect("File store should reopen.");

	assert_eq!(reopened.load(&config.store_key).await.expect("Load should succeed."), None);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
	});
}

#[tokio::test]
async fn corrupt_entries_are_replaced_with_a_fresh_token() {
	let config = common::config(3);
	let store = MemoryStore::default();

	store.insert(config.store_key.clone(), r#"{"access_token":"stale","expires_in":60}"#);

	let transport = ScriptedTransport::new([]);
	let auth = AuthCoordinator::from_config(&config, Arc::new(store.clone()), transport.clone());

	assert_eq!(auth.get_access_token().await.expect("Fresh token.").expose(), "t1");
	assert_eq!(transport.token_calls(), 1);

	let raw = store.get(&config.store_key).expect("Fresh token should be persisted.");

	assert!(raw.contains("\"t1\""));
	assert!(raw.contains("expires_at_ms"));
}

#[tokio::test]
async fn revoking_twice_is_safe() {
	let config = common::config(3);
	let store = MemoryStore::default();
	let auth = AuthCoordinator::from_config(
		&config,
		Arc::new(store.clone()),
		ScriptedTransport::new([]),
	);

	auth.get_access_token().await.expect("Token should be issued.");
	auth.revoke().await.expect("First revoke should succeed.");
	auth.revoke().await.expect("Second revoke should succeed.");

	assert!(auth.cache().peek().is_none());
	assert!(store.is_empty());
}
