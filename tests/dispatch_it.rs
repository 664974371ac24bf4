// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use esign_client::{
	_preludet::*,
	auth::Credential,
	cache::{CacheStore, MemoryCache},
	client::EsignClient,
	config::ClientConfig,
	dispatch::RequestDescriptor,
	error::TransportError,
	http::{APP_ID_HEADER, TOKEN_HEADER},
	token::TOKEN_PATH,
};

const APP_ID: &str = "7438807123";
const SECRET: &str = "secret-7438807123";
const ACCOUNTS_PATH: &str = "/v3/persons/identity-info";
const FLOW_PATH: &str = "/v3/sign-flow/create-by-file";

fn config(server: &MockServer) -> ClientConfig {
	let credential = Credential::new(APP_ID, SECRET).expect("Credential fixture should be valid.");
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	ClientConfig::new(credential).with_base_url(base_url)
}

fn build_client(config: ClientConfig) -> (EsignClient, Arc<MemoryCache>) {
	let backend = Arc::new(MemoryCache::default());
	let client = build_reqwest_test_client(config, backend.clone());

	(client, backend)
}

async fn mock_token<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
	let token = token.to_owned();

	server
		.mock_async(move |when, then| {
			when.method(GET).path(TOKEN_PATH).query_param("appId", APP_ID);
			then.status(200).json_body(json!({ "code": 0, "data": { "token": token } }));
		})
		.await
}

#[tokio::test]
async fn get_attaches_auth_headers_and_query() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(config(&server));
	let token_mock = mock_token(&server, "tok-A").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(ACCOUNTS_PATH)
				.query_param("psnAccount", "13800000000")
				.header(APP_ID_HEADER, APP_ID)
				.header(TOKEN_HEADER, "tok-A");
			then.status(200)
				.json_body(json!({ "code": 0, "message": "成功", "data": { "psnId": "p-1" } }));
		})
		.await;
	let body = client
		.dispatch(RequestDescriptor::get(ACCOUNTS_PATH).with_param("psnAccount", "13800000000"))
		.await
		.expect("Authenticated GET should succeed.");

	assert_eq!(body.pointer("/data/psnId").and_then(|id| id.as_str()), Some("p-1"));

	token_mock.assert_async().await;
	api_mock.assert_async().await;
}

#[tokio::test]
async fn post_sends_json_body() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(config(&server));
	let params = json!({ "docs": [{ "fileId": "f-1" }], "signFlowConfig": { "autoStart": true } });
	let _token_mock = mock_token(&server, "tok-A").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(FLOW_PATH)
				.header("content-type", "application/json")
				.header(TOKEN_HEADER, "tok-A")
				.json_body(json!({
					"docs": [{ "fileId": "f-1" }],
					"signFlowConfig": { "autoStart": true },
				}));
			then.status(200).json_body(json!({ "code": 0, "data": { "signFlowId": "sf-1" } }));
		})
		.await;
	let serde_json::Value::Object(params) = params else {
		panic!("Params fixture should be an object.");
	};
	let body = client
		.dispatcher()
		.post(FLOW_PATH, params)
		.await
		.expect("Authenticated POST should succeed.");

	assert_eq!(body.pointer("/data/signFlowId").and_then(|id| id.as_str()), Some("sf-1"));

	api_mock.assert_async().await;
}

#[tokio::test]
async fn stale_token_is_refreshed_once_and_resent() {
	let server = MockServer::start_async().await;
	let (client, backend) = build_client(config(&server));
	let key = client.token_manager().cache_key();

	backend
		.put(key.as_str(), "tok-stale".into(), time::Duration::minutes(100))
		.await
		.expect("Seeding the cache should succeed.");

	let token_mock = mock_token(&server, "tok-fresh").await;
	let stale_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH).header(TOKEN_HEADER, "tok-stale");
			then.status(401).json_body(json!({ "code": 401, "message": "token已失效" }));
		})
		.await;
	let fresh_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH).header(TOKEN_HEADER, "tok-fresh");
			then.status(200).json_body(json!({ "code": 0, "data": { "psnId": "p-2" } }));
		})
		.await;
	let body = client
		.dispatch(RequestDescriptor::get(ACCOUNTS_PATH))
		.await
		.expect("Dispatch should recover after one refresh.");

	assert_eq!(body.pointer("/data/psnId").and_then(|id| id.as_str()), Some("p-2"));

	token_mock.assert_calls_async(1).await;
	stale_mock.assert_calls_async(1).await;
	fresh_mock.assert_calls_async(1).await;

	let metrics = client.dispatcher().metrics();

	assert_eq!(metrics.attempts(), 2);
	assert_eq!(metrics.forced_refreshes(), 1);
	assert_eq!(metrics.successes(), 1);
	assert_eq!(
		backend.get(key.as_str()).await.expect("Cache read should succeed."),
		Some("tok-fresh".into())
	);
}

#[tokio::test]
async fn body_code_auth_failure_is_retried() {
	let server = MockServer::start_async().await;
	let (client, backend) = build_client(config(&server));
	let key = client.token_manager().cache_key();

	backend
		.put(key.as_str(), "tok-stale".into(), time::Duration::minutes(100))
		.await
		.expect("Seeding the cache should succeed.");

	let _token_mock = mock_token(&server, "tok-fresh").await;
	let stale_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH).header(TOKEN_HEADER, "tok-stale");
			then.status(200).json_body(json!({ "code": 401, "message": "token无效" }));
		})
		.await;
	let fresh_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH).header(TOKEN_HEADER, "tok-fresh");
			then.status(200).json_body(json!({ "code": 0, "data": null }));
		})
		.await;

	client.dispatch(RequestDescriptor::get(ACCOUNTS_PATH)).await.expect("Dispatch should recover.");

	stale_mock.assert_async().await;
	fresh_mock.assert_async().await;
}

#[tokio::test]
async fn persistent_rejection_exhausts_retries() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(config(&server));
	let token_mock = mock_token(&server, "tok-A").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH);
			then.status(401).json_body(json!({ "code": 401, "message": "token已失效" }));
		})
		.await;
	let err = client
		.dispatch(RequestDescriptor::get(ACCOUNTS_PATH))
		.await
		.expect_err("Persistent 401s should surface an authentication error.");

	assert!(err.is_authentication());
	assert_eq!(
		err.response().and_then(|body| body.get("message")).and_then(|msg| msg.as_str()),
		Some("token已失效")
	);

	// One initial send plus two forced-refresh resends.
	api_mock.assert_calls_async(3).await;
	token_mock.assert_calls_async(3).await;

	let metrics = client.dispatcher().metrics();

	assert_eq!(metrics.forced_refreshes(), 2);
	assert_eq!(metrics.failures(), 1);
}

#[tokio::test]
async fn zero_retry_budget_sends_once() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(config(&server).with_max_retries(0));
	let token_mock = mock_token(&server, "tok-A").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH);
			then.status(401).body("unauthorized");
		})
		.await;
	let err = client
		.dispatch(RequestDescriptor::get(ACCOUNTS_PATH))
		.await
		.expect_err("401 should fail without retries.");

	assert!(matches!(err, Error::Authentication { .. }));

	api_mock.assert_calls_async(1).await;
	token_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn business_errors_are_not_retried() {
	let server = MockServer::start_async().await;
	let (client, _) = build_client(config(&server));
	let token_mock = mock_token(&server, "tok-A").await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(FLOW_PATH);
			then.status(200).json_body(json!({ "code": 1435002, "message": "参数错误" }));
		})
		.await;
	let err = client
		.dispatch(RequestDescriptor::post(FLOW_PATH).with_param("docs", json!([])))
		.await
		.expect_err("Non-zero business code should fail.");

	match err {
		Error::Api { status, code, message, .. } => {
			assert_eq!(status, 200);
			assert_eq!(code, Some(1435002));
			assert_eq!(message, "参数错误");
		},
		other => panic!("Expected an API error, got {other:?}."),
	}

	api_mock.assert_calls_async(1).await;
	token_mock.assert_calls_async(1).await;
	assert_eq!(client.dispatcher().metrics().forced_refreshes(), 0);
}

#[tokio::test]
async fn slow_responses_time_out() {
	let server = MockServer::start_async().await;
	let (client, _) =
		build_client(config(&server).with_timeout(time::Duration::milliseconds(200)));
	let _token_mock = mock_token(&server, "tok-A").await;
	let _api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ACCOUNTS_PATH);
			then.status(200)
				.delay(std::time::Duration::from_secs(2))
				.json_body(json!({ "code": 0 }));
		})
		.await;
	let err = client
		.dispatch(RequestDescriptor::get(ACCOUNTS_PATH))
		.await
		.expect_err("Delayed response should exceed the timeout.");

	assert!(matches!(err, Error::Transport(TransportError::Timeout { .. })));
}
