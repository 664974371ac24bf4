//! Demonstrates plugging a non-reqwest stack into the client.
//!
//! 1. Implement [`HttpTransport`] so it answers a [`TransportRequest`] with a raw
//!    [`TransportResponse`].
//! 2. Report failures to reach the server as [`TransportError`]s; any HTTP status is a response.
//! 3. Pass the transport to [`Client::with_transport`].

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use serde_json::json;
// self
use esign_client::{
	auth::Credential,
	cache::MemoryCache,
	client::Client,
	config::ClientConfig,
	dispatch::RequestDescriptor,
	error::{Error, TransportError},
	http::{HttpTransport, TransportFuture, TransportRequest, TransportResponse},
	token::TOKEN_PATH,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = ClientConfig::new(Credential::new("7438807123", "demo-secret")?);
	let client: Client<CannedTransport> = Client::with_transport(
		config.clone(),
		Arc::new(MemoryCache::default()),
		CannedTransport::default(),
	)?;
	let body = client.dispatch(RequestDescriptor::get("/v3/persons/identity-info")).await?;

	println!("Identity lookup answered by the canned transport: {body}.");

	let offline: Client<OfflineTransport> =
		Client::with_transport(config, Arc::new(MemoryCache::default()), OfflineTransport)?;

	match offline.dispatch(RequestDescriptor::get("/v3/persons/identity-info")).await {
		Err(Error::Transport(e)) => println!("Offline transport surfaced: {e}."),
		other => println!("Unexpected offline result: {other:?}."),
	}

	Ok(())
}

/// Answers every call locally; the token endpoint issues a new token each time.
#[derive(Debug, Default)]
struct CannedTransport {
	issued: AtomicUsize,
}
impl HttpTransport for CannedTransport {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		let body = if request.path == TOKEN_PATH {
			let serial = self.issued.fetch_add(1, Ordering::Relaxed) + 1;

			json!({ "code": 0, "data": { "token": format!("canned-{serial}") } })
		} else {
			let token = request.auth.as_ref().map(|auth| auth.token.expose().to_owned());

			json!({ "code": 0, "data": { "path": request.path, "token": token } })
		};

		Box::pin(async move {
			let bytes = serde_json::to_vec(&body).map_err(TransportError::network)?;

			Ok(TransportResponse::new(200, bytes))
		})
	}
}

/// Fails every call as if the host were unreachable.
#[derive(Debug)]
struct OfflineTransport;
impl HttpTransport for OfflineTransport {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			Err(TransportError::network_at(
				request.path,
				std::io::Error::new(std::io::ErrorKind::NotConnected, "host unreachable"),
			))
		})
	}
}
