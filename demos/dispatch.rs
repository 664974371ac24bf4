//! Demonstrates the reqwest-backed client against a local mock of the open API.
//!
//! The cache starts with a stale token, so the first call is rejected, the dispatcher forces a
//! refresh, and the resend succeeds. The mock server speaks HTTPS with a self-signed certificate,
//! so the demo extends the transport's client builder to trust it.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use time::Duration;
use url::Url;
// self
use esign_client::{
	auth::Credential,
	cache::{CacheStore, MemoryCache},
	client::EsignClient,
	config::ClientConfig,
	dispatch::RequestDescriptor,
	http::{ReqwestTransport, TOKEN_HEADER},
	token::TOKEN_PATH,
};

const FLOW_PATH: &str = "/v3/sign-flow/create-by-file";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(TOKEN_PATH).query_param("grantType", "client_credentials");
			then.status(200).json_body(json!({ "code": 0, "data": { "token": "demo-fresh" } }));
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path(FLOW_PATH).header(TOKEN_HEADER, "demo-stale");
			then.status(401).json_body(json!({ "code": 401, "message": "token已失效" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(POST).path(FLOW_PATH).header(TOKEN_HEADER, "demo-fresh");
			then.status(200).json_body(json!({ "code": 0, "data": { "signFlowId": "demo-flow" } }));
		})
		.await;
	let cache = Arc::new(MemoryCache::default());
	let config = ClientConfig::new(Credential::new("7438807123", "demo-secret")?)
		.with_base_url(Url::parse(&server.base_url())?)
		.with_timeout(Duration::seconds(2));
	let http_client = ReqwestTransport::client_builder(config.timeout)
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let transport = ReqwestTransport::with_client(http_client, config.resolved_base_url()?);
	let client = EsignClient::with_transport(config, cache.clone(), transport)?;
	let key = client.token_manager().cache_key();

	cache.put(key.as_str(), "demo-stale".into(), Duration::minutes(100)).await?;

	let body = client
		.dispatch(
			RequestDescriptor::post(FLOW_PATH)
				.with_param("docs", json!([{ "fileId": "demo-file" }]))
				.with_param("signFlowConfig", json!({ "signFlowTitle": "Demo contract" })),
		)
		.await?;
	let metrics = client.dispatcher().metrics();

	println!("Sign flow created: {}.", body["data"]["signFlowId"]);
	println!(
		"Attempts: {}. Forced refreshes: {}. Token calls: {}. Rejected: {}. Accepted: {}.",
		metrics.attempts(),
		metrics.forced_refreshes(),
		token_mock.calls_async().await,
		rejected.calls_async().await,
		accepted.calls_async().await,
	);

	Ok(())
}
