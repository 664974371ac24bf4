// std
use std::{env, fs, path::PathBuf};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use esign_client::{
	_preludet::*,
	auth::Credential,
	cache::{CacheStore, FileCache},
	config::ClientConfig,
	token::TOKEN_PATH,
};

fn temp_path(label: &str) -> PathBuf {
	let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();

	env::temp_dir().join(format!("esign-client-{label}-{}-{nanos}.json", std::process::id()))
}

fn config(server: &MockServer) -> ClientConfig {
	let credential = Credential::new("7438807123", "secret-7438807123")
		.expect("Credential fixture should be valid.");
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	ClientConfig::new(credential).with_base_url(base_url)
}

#[tokio::test]
async fn file_cache_serves_tokens_across_restarts() {
	let server = MockServer::start_async().await;
	let path = temp_path("restart");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "code": 0, "data": { "token": "tok-file" } }));
		})
		.await;
	let first = {
		let cache: Arc<dyn CacheStore> =
			Arc::new(FileCache::open(&path).expect("File cache should open."));
		let client = build_reqwest_test_client(config(&server), cache);

		client.token_manager().token(false).await.expect("Initial token should be fetched.")
	};
	let reopened: Arc<dyn CacheStore> =
		Arc::new(FileCache::open(&path).expect("File cache should reopen."));
	let client = build_reqwest_test_client(config(&server), reopened);
	let second =
		client.token_manager().token(false).await.expect("Token should load from the snapshot.");

	assert_eq!(first.expose(), "tok-file");
	assert_eq!(second.expose(), "tok-file");

	mock.assert_calls_async(1).await;

	for file in [path.clone(), path.with_extension("lock")] {
		if let Err(e) = fs::remove_file(&file) {
			panic!("Failed to remove temporary file {}: {e}", file.display());
		}
	}
}

#[tokio::test]
async fn clients_on_one_snapshot_share_a_token() {
	let server = MockServer::start_async().await;
	let path = temp_path("shared");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "code": 0, "data": { "token": "tok-shared" } }));
		})
		.await;
	let writer_cache: Arc<dyn CacheStore> =
		Arc::new(FileCache::open(&path).expect("File cache should open."));
	let reader_cache: Arc<dyn CacheStore> =
		Arc::new(FileCache::open(&path).expect("File cache should open a second time."));
	let writer = build_reqwest_test_client(config(&server), writer_cache);
	let reader = build_reqwest_test_client(config(&server), reader_cache);

	writer.token_manager().token(false).await.expect("Writer should fetch a token.");

	let token =
		reader.token_manager().token(false).await.expect("Reader should load the shared token.");

	assert_eq!(token.expose(), "tok-shared");

	mock.assert_calls_async(1).await;

	for file in [path.clone(), path.with_extension("lock")] {
		if let Err(e) = fs::remove_file(&file) {
			panic!("Failed to remove temporary file {}: {e}", file.display());
		}
	}
}
