//! Client facade wiring the token manager and dispatcher from one [`ClientConfig`].

// self
use crate::{
	_prelude::*,
	cache::CacheStore,
	config::ClientConfig,
	dispatch::{Dispatcher, RequestDescriptor},
	http::HttpTransport,
	obs,
	token::TokenManager,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Client backed by the built-in reqwest transport.
#[cfg(feature = "reqwest")]
pub type EsignClient = Client<ReqwestTransport>;

/// Token manager and dispatcher built from a single configuration.
///
/// Cloning is cheap; clones share the cache, transport, single-flight guards, and dispatch
/// counters.
pub struct Client<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	tokens: Arc<TokenManager<T>>,
	dispatcher: Dispatcher<T>,
}
impl<T> Client<T>
where
	T: ?Sized + HttpTransport,
{
	/// Builds a client around a caller-supplied transport.
	pub fn with_transport(
		config: ClientConfig,
		cache: Arc<dyn CacheStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let tokens = Arc::new(TokenManager::from_config(&config, cache, transport)?);
		let dispatcher = Dispatcher::from_config(&config, tokens.clone());

		obs::event!(
			debug,
			app_id = %config.app_id,
			secret = %config.secret.masked(),
			production = config.production,
			max_retries = config.max_retries,
			cache_key = %tokens.cache_key(),
			"Constructed eSign client."
		);

		Ok(Self { config: Arc::new(config), tokens, dispatcher })
	}

	/// Returns the configuration the client was built from.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the access token manager.
	pub fn token_manager(&self) -> &Arc<TokenManager<T>> {
		&self.tokens
	}

	/// Returns the authenticated-request dispatcher.
	pub fn dispatcher(&self) -> &Dispatcher<T> {
		&self.dispatcher
	}

	/// Shorthand for [`Dispatcher::dispatch`].
	pub async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<JsonValue> {
		self.dispatcher.dispatch(descriptor).await
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Builds a client with a reqwest transport honoring the configured base URL and timeout.
	pub fn from_config(config: ClientConfig, cache: Arc<dyn CacheStore>) -> Result<Self> {
		config.validate()?;

		let transport = ReqwestTransport::from_config(&config)?;

		Self::with_transport(config, cache, transport)
	}
}
impl<T> Clone for Client<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			tokens: self.tokens.clone(),
			dispatcher: self.dispatcher.clone(),
		}
	}
}
impl<T> Debug for Client<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("config", &self.config)
			.field("dispatcher", &self.dispatcher)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{ScriptedReply, ScriptedTransport, test_cache, test_config};

	#[tokio::test]
	async fn accessors_share_one_token_manager() {
		let (backend, cache) = test_cache();
		let transport = ScriptedTransport::issuing_tokens(1);

		transport.push_api_reply(ScriptedReply::Json(200, serde_json::json!({ "code": 0 })));

		let client: Client<ScriptedTransport> = Client::with_transport(
			test_config("7438807123", "secret-value").with_max_retries(4),
			cache,
			transport,
		)
		.expect("Client should build.");

		assert_eq!(client.config().max_retries, 4);
		assert_eq!(client.dispatcher().max_retries(), 4);
		assert!(Arc::ptr_eq(client.token_manager(), client.dispatcher().tokens()));

		client
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect("Dispatch should succeed.");

		let key = client.token_manager().cache_key();

		assert!(backend.expires_at(key.as_str()).is_some());
		assert_eq!(client.clone().dispatcher().metrics().successes(), 1);
	}

	#[test]
	fn invalid_config_is_rejected() {
		let (_, cache) = test_cache();
		let config = test_config("7438807123", "secret-value").with_token_ttl(Duration::ZERO);
		let err = Client::<ScriptedTransport>::with_transport(
			config,
			cache,
			ScriptedTransport::default(),
		)
		.expect_err("Zero TTL should be rejected.");

		assert!(matches!(err, Error::Config(_)));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_client_uses_sandbox_base_url() {
		let (_, cache) = test_cache();
		let client = EsignClient::from_config(test_config("7438807123", "secret-value"), cache)
			.expect("Reqwest client should build.");

		assert_eq!(
			client.token_manager().transport().base_url().as_str(),
			"https://smlopenapi.esign.cn/"
		);
	}
}
