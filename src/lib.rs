//! Async client for the e签宝 (eSign) open API.
//!
//! Access tokens are cached per application and refreshed through a single-flight guard; the
//! dispatcher attaches them to every call and retries with a forced refresh whenever the platform
//! rejects a stale token.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	#[cfg(feature = "reqwest")]
	use crate::{
		client::{Client, EsignClient},
		http::ReqwestTransport,
	};
	use crate::{
		auth::Credential,
		cache::{CacheStore, MemoryCache},
		config::ClientConfig,
		error::TransportError,
		http::{HttpTransport, TransportFuture, TransportRequest, TransportResponse},
	};

	/// Scripted reply returned by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// Responds with the given status and JSON body.
		Json(u16, serde_json::Value),
		/// Responds with the given status and raw body bytes.
		Raw(u16, Vec<u8>),
		/// Fails with a network error carrying the message.
		NetworkFailure(String),
	}

	/// In-process [`HttpTransport`] that replays scripted replies and records every request.
	///
	/// Requests to the token endpoint are answered by the token script, every other path by the
	/// API script. When a script runs dry its last reply is repeated.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		token_replies: Mutex<Vec<ScriptedReply>>,
		api_replies: Mutex<Vec<ScriptedReply>>,
		requests: Mutex<Vec<TransportRequest>>,
	}
	impl ScriptedTransport {
		/// Creates a transport whose token endpoint issues `tok-1`, `tok-2`, ... in order.
		pub fn issuing_tokens(count: usize) -> Self {
			let transport = Self::default();

			for idx in 1..=count {
				let body = serde_json::json!({
					"code": 0,
					"message": "ok",
					"data": { "token": format!("tok-{idx}") },
				});

				transport.push_token_reply(ScriptedReply::Json(200, body));
			}

			transport
		}

		/// Appends a token endpoint reply.
		pub fn push_token_reply(&self, reply: ScriptedReply) {
			self.token_replies.lock().push(reply);
		}

		/// Appends an API reply.
		pub fn push_api_reply(&self, reply: ScriptedReply) {
			self.api_replies.lock().push(reply);
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().clone()
		}

		/// Counts requests sent to the token endpoint.
		pub fn token_requests(&self) -> usize {
			self.requests.lock().iter().filter(|req| req.path == crate::token::TOKEN_PATH).count()
		}

		/// Counts requests sent to any other endpoint.
		pub fn api_requests(&self) -> usize {
			self.requests.lock().iter().filter(|req| req.path != crate::token::TOKEN_PATH).count()
		}

		fn next(script: &Mutex<Vec<ScriptedReply>>) -> ScriptedReply {
			let mut script = script.lock();

			if script.len() > 1 {
				script.remove(0)
			} else {
				script.first().cloned().unwrap_or(ScriptedReply::NetworkFailure(
					"No scripted reply is configured.".into(),
				))
			}
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
			let reply = if request.path == crate::token::TOKEN_PATH {
				Self::next(&self.token_replies)
			} else {
				Self::next(&self.api_replies)
			};

			self.requests.lock().push(request);

			Box::pin(async move {
				match reply {
					ScriptedReply::Json(status, body) => Ok(TransportResponse::new(
						status,
						serde_json::to_vec(&body).map_err(TransportError::network)?,
					)),
					ScriptedReply::Raw(status, body) => Ok(TransportResponse::new(status, body)),
					ScriptedReply::NetworkFailure(message) =>
						Err(TransportError::network(std::io::Error::other(message))),
				}
			})
		}
	}

	/// Builds a sandbox configuration for the provided credential pair.
	pub fn test_config(app_id: &str, secret: &str) -> ClientConfig {
		let credential =
			Credential::new(app_id, secret).expect("Test credential fixture should be valid.");

		ClientConfig::new(credential).with_production(false)
	}

	/// Creates a shared in-memory cache plus the trait-object handle managers consume.
	pub fn test_cache() -> (Arc<MemoryCache>, Arc<dyn CacheStore>) {
		let backend = Arc::new(MemoryCache::default());
		let cache: Arc<dyn CacheStore> = backend.clone();

		(backend, cache)
	}

	/// Builds a reqwest transport that trusts the self-signed certificate of a local HTTPS mock
	/// server. Timeout and base URL come from `config`.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport(config: &ClientConfig) -> ReqwestTransport {
		let client = ReqwestTransport::client_builder(config.timeout)
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");
		let base_url = config.resolved_base_url().expect("Test base URL should resolve.");

		ReqwestTransport::with_client(client, base_url)
	}

	/// Builds an [`EsignClient`] over [`test_reqwest_transport`] and the provided cache.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(
		config: ClientConfig,
		cache: Arc<dyn CacheStore>,
	) -> EsignClient {
		let transport = test_reqwest_transport(&config);

		Client::with_transport(config, cache, transport)
			.expect("Failed to build Reqwest test client.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
