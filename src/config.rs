//! Client configuration consumed by the token manager, dispatcher, and default transport.

// crates.io
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{AppId, CacheKey, CacheKeyPolicy, ClientSecret, Credential, DEFAULT_CACHE_PREFIX},
	error::ConfigError,
};

/// Production open API endpoint.
pub const PRODUCTION_BASE_URL: &str = "https://openapi.esign.cn";
/// Sandbox open API endpoint.
pub const SANDBOX_BASE_URL: &str = "https://smlopenapi.esign.cn";
/// Retry budget applied when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Transport timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(5);
/// Lifetime of a cached access token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::minutes(100);
/// Business code the platform returns for a missing, expired, or invalid token.
pub const DEFAULT_AUTH_FAILURE_CODE: i64 = 401;

/// Explicit configuration passed to every client component.
///
/// Deserializes from the same keys the platform documents (`app_id`, `secret`, `production`,
/// `max_retries`, ...); everything except the credential pair has a default.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
	/// Application identifier.
	pub app_id: AppId,
	/// Application secret.
	pub secret: ClientSecret,
	/// Selects the production (`true`) or sandbox base URL.
	#[serde(default = "default_production")]
	pub production: bool,
	/// Overrides the environment-selected base URL.
	#[serde(default)]
	pub base_url: Option<Url>,
	/// Number of forced-refresh retries after an authentication rejection.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Per-request transport timeout, in seconds when deserialized.
	#[serde(default = "default_timeout", deserialize_with = "deserialize_secs")]
	pub timeout: Duration,
	/// Explicit cache key replacing `cache_prefix + app_id`.
	#[serde(default)]
	pub cache_key: Option<CacheKey>,
	/// Prefix for derived cache keys.
	#[serde(default = "default_cache_prefix")]
	pub cache_prefix: String,
	/// Lifetime of cached tokens, in seconds when deserialized.
	#[serde(default = "default_token_ttl", deserialize_with = "deserialize_secs")]
	pub token_ttl: Duration,
	/// Body `code` values treated as authentication failures.
	#[serde(default = "default_auth_failure_codes")]
	pub auth_failure_codes: Vec<i64>,
}
impl ClientConfig {
	/// Creates a production configuration with defaults for everything but the credential.
	pub fn new(credential: Credential) -> Self {
		Self {
			app_id: credential.app_id,
			secret: credential.secret,
			production: default_production(),
			base_url: None,
			max_retries: DEFAULT_MAX_RETRIES,
			timeout: DEFAULT_TIMEOUT,
			cache_key: None,
			cache_prefix: DEFAULT_CACHE_PREFIX.into(),
			token_ttl: DEFAULT_TOKEN_TTL,
			auth_failure_codes: default_auth_failure_codes(),
		}
	}

	/// Selects the production or sandbox endpoint.
	pub fn with_production(mut self, production: bool) -> Self {
		self.production = production;

		self
	}

	/// Pins the base URL, ignoring the environment flag.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the transport timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Pins the cache key.
	pub fn with_cache_key(mut self, key: CacheKey) -> Self {
		self.cache_key = Some(key);

		self
	}

	/// Overrides the prefix for derived cache keys.
	pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.cache_prefix = prefix.into();

		self
	}

	/// Overrides the cached token lifetime.
	pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
		self.token_ttl = ttl;

		self
	}

	/// Replaces the body codes treated as authentication failures.
	pub fn with_auth_failure_codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
		self.auth_failure_codes = codes.into_iter().collect();

		self
	}

	/// Returns the credential pair.
	pub fn credential(&self) -> Credential {
		Credential { app_id: self.app_id.clone(), secret: self.secret.clone() }
	}

	/// Returns the cache key policy described by `cache_key` + `cache_prefix`.
	pub fn cache_key_policy(&self) -> CacheKeyPolicy {
		CacheKeyPolicy { prefix: self.cache_prefix.clone(), explicit: self.cache_key.clone() }
	}

	/// Returns the explicit base URL, or the one selected by `production`.
	pub fn resolved_base_url(&self) -> Result<Url, ConfigError> {
		match &self.base_url {
			Some(url) => Ok(url.clone()),
			None => {
				let raw = if self.production { PRODUCTION_BASE_URL } else { SANDBOX_BASE_URL };

				Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })
			},
		}
	}

	/// Checks invariants serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.secret.expose().is_empty() {
			return Err(ConfigError::EmptySecret);
		}
		if !self.token_ttl.is_positive() {
			return Err(ConfigError::NonPositiveTtl);
		}

		self.resolved_base_url().map(|_| ())
	}
}

fn default_production() -> bool {
	true
}

fn default_max_retries() -> u32 {
	DEFAULT_MAX_RETRIES
}

fn default_timeout() -> Duration {
	DEFAULT_TIMEOUT
}

fn default_cache_prefix() -> String {
	DEFAULT_CACHE_PREFIX.into()
}

fn default_token_ttl() -> Duration {
	DEFAULT_TOKEN_TTL
}

fn default_auth_failure_codes() -> Vec<i64> {
	vec![DEFAULT_AUTH_FAILURE_CODE]
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	let secs = f64::deserialize(deserializer)?;

	if !secs.is_finite() || secs < 0.0 || secs > i64::MAX as f64 {
		return Err(serde::de::Error::custom(format!(
			"duration must be a non-negative number of seconds, got {secs}"
		)));
	}

	Ok(Duration::seconds_f64(secs))
}
