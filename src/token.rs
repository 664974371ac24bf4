//! Access token lifecycle: cache lookups, token endpoint exchanges, and single-flight refreshes.
//!
//! [`TokenManager::token`] serves the cached token for the manager's [`CacheKey`] and only calls
//! the token endpoint when the cache has nothing (or the caller forces a refresh). The manager
//! never tracks expiry itself; the cache's TTL is the sole expiry signal. A per-key single-flight
//! guard makes concurrent misses share one token endpoint call instead of stampeding it.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppId, CacheKey, CacheKeyPolicy, Credential},
	cache::CacheStore,
	config::{ClientConfig, DEFAULT_TOKEN_TTL},
	http::{self, HttpTransport, Method, TransportRequest},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Token endpoint path.
pub const TOKEN_PATH: &str = "/v1/oauth2/access_token";
/// Grant type sent to the token endpoint.
pub const GRANT_TYPE: &str = "client_credentials";

/// Registry of per-[`CacheKey`] single-flight guards.
///
/// Clone the registry into every manager that shares a cache so managers resolving the same key
/// also share its guard.
#[derive(Clone, Debug, Default)]
pub struct FlightGuards(Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>);
impl FlightGuards {
	/// Returns (and creates on demand) the guard for `key`.
	pub(crate) fn guard(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.0.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

/// Successful token endpoint exchange.
#[derive(Clone, Debug)]
pub struct TokenResponse {
	/// Token extracted from `data.token`.
	pub token: AccessToken,
	/// Full decoded response body.
	pub response: JsonValue,
}

/// Produces valid bearer tokens for a single credential.
pub struct TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	credential: Credential,
	cache_key_policy: CacheKeyPolicy,
	ttl: Duration,
	cache: Arc<dyn CacheStore>,
	transport: Arc<T>,
	flight_guards: FlightGuards,
}
impl<T> TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a manager with the default cache key policy and a 100-minute token TTL.
	pub fn new(
		credential: Credential,
		cache: Arc<dyn CacheStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			credential,
			cache_key_policy: CacheKeyPolicy::default(),
			ttl: DEFAULT_TOKEN_TTL,
			cache,
			transport: transport.into(),
			flight_guards: FlightGuards::default(),
		}
	}

	/// Creates a manager from the credential, cache key policy, and TTL in `config`.
	pub fn from_config(
		config: &ClientConfig,
		cache: Arc<dyn CacheStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self::new(config.credential(), cache, transport)
			.with_cache_key_policy(config.cache_key_policy())
			.with_ttl(config.token_ttl))
	}

	/// Replaces the prefix used for derived cache keys.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.cache_key_policy.prefix = prefix.into();

		self
	}

	/// Pins the cache key, bypassing `prefix + app_id` derivation.
	pub fn with_cache_key(mut self, key: CacheKey) -> Self {
		self.cache_key_policy.explicit = Some(key);

		self
	}

	/// Replaces the whole cache key policy.
	pub fn with_cache_key_policy(mut self, policy: CacheKeyPolicy) -> Self {
		self.cache_key_policy = policy;

		self
	}

	/// Overrides the lifetime given to freshly fetched tokens.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Shares a single-flight registry with other managers.
	pub fn with_flight_guards(mut self, guards: FlightGuards) -> Self {
		self.flight_guards = guards;

		self
	}

	/// Returns the credential pair.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Returns the application identifier.
	pub fn app_id(&self) -> &AppId {
		&self.credential.app_id
	}

	/// Returns the key tokens are cached under.
	pub fn cache_key(&self) -> CacheKey {
		self.cache_key_policy.resolve(&self.credential.app_id)
	}

	/// Returns the lifetime given to freshly fetched tokens.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the transport shared with the dispatcher.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Returns the single-flight registry.
	pub fn flight_guards(&self) -> &FlightGuards {
		&self.flight_guards
	}

	/// Returns the cached token, fetching and caching a fresh one when the cache is empty or
	/// `force_refresh` is set.
	///
	/// A forced refresh always calls the token endpoint and overwrites the cache entry. Failures
	/// leave the cache untouched.
	pub async fn token(&self, force_refresh: bool) -> Result<AccessToken> {
		const KIND: OpKind = OpKind::Token;

		let span = OpSpan::new(KIND, if force_refresh { "force_refresh" } else { "token" });
		let result = span
			.instrument(async move {
				let key = self.cache_key();

				if let Some(cached) = self.cached_unless(force_refresh, &key).await? {
					obs::event!(debug, cache_key = %key, "Serving cached access token.");

					return Ok(cached);
				}

				let guard = self.flight_guards.guard(&key);
				let _singleflight = guard.lock().await;

				// Another caller may have filled the cache while this one waited on the guard.
				if let Some(cached) = self.cached_unless(force_refresh, &key).await? {
					return Ok(cached);
				}

				obs::record_op_outcome(KIND, OpOutcome::Attempt);

				let fetched = self.fetch_from_server().await?;

				self.cache.put(key.as_str(), fetched.token.expose().to_owned(), self.ttl).await?;
				obs::event!(
					debug,
					cache_key = %key,
					force_refresh,
					ttl_secs = self.ttl.whole_seconds(),
					"Cached fresh access token."
				);

				Ok(fetched.token)
			})
			.await;

		if result.is_err() {
			obs::record_op_outcome(KIND, OpOutcome::Failure);
		}

		result
	}

	/// Exchanges the credential for a new token at [`TOKEN_PATH`] without touching the cache.
	///
	/// Fails with [`Error::Authentication`] when the decoded body has no non-empty `data.token`,
	/// embedding the full body for diagnostics.
	pub async fn fetch_from_server(&self) -> Result<TokenResponse> {
		let mut params = JsonMap::new();

		params.insert("appId".into(), self.credential.app_id.to_string().into());
		params.insert("secret".into(), self.credential.secret.expose().into());
		params.insert("grantType".into(), GRANT_TYPE.into());

		let request = TransportRequest::new(Method::Get, TOKEN_PATH).with_params(params);
		let response = self.transport.send(request).await?;
		let body = http::decode_json(&response.body)?;
		let token = body
			.pointer("/data/token")
			.and_then(JsonValue::as_str)
			.filter(|token| !token.is_empty())
			.map(AccessToken::new);

		match token {
			Some(token) => {
				obs::record_op_outcome(OpKind::Token, OpOutcome::Success);

				Ok(TokenResponse { token, response: body })
			},
			None => {
				obs::event!(
					warn,
					status = response.status,
					app_id = %self.credential.app_id,
					"Token endpoint response is missing data.token."
				);

				let message = if response.is_success() {
					"Token endpoint response is missing data.token".to_owned()
				} else {
					format!("Token endpoint rejected the credential (status {})", response.status)
				};

				Err(Error::Authentication { message, response: body })
			},
		}
	}

	async fn cached_unless(
		&self,
		force_refresh: bool,
		key: &CacheKey,
	) -> Result<Option<AccessToken>> {
		if force_refresh {
			return Ok(None);
		}

		let cached = self.cache.get(key.as_str()).await?;

		Ok(cached.filter(|value| !value.is_empty()).map(AccessToken::new))
	}
}
impl<T> Clone for TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			credential: self.credential.clone(),
			cache_key_policy: self.cache_key_policy.clone(),
			ttl: self.ttl,
			cache: self.cache.clone(),
			transport: self.transport.clone(),
			flight_guards: self.flight_guards.clone(),
		}
	}
}
impl<T> Debug for TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("app_id", &self.credential.app_id)
			.field("cache_key", &self.cache_key())
			.field("ttl", &self.ttl)
			.finish()
	}
}
