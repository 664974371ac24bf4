//! Cache key derivation for stored access tokens.

// self
use crate::{_prelude::*, auth::AppId, error::ConfigError};

/// Prefix prepended to the application identifier when no explicit key is configured.
pub const DEFAULT_CACHE_PREFIX: &str = "esign.common.access_token.";

/// Key under which a credential's access token is cached.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);
impl CacheKey {
	/// Wraps an explicit, non-empty key.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();

		if value.is_empty() {
			return Err(ConfigError::EmptyCacheKey);
		}

		Ok(Self(value))
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for CacheKey {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<CacheKey> for String {
	fn from(value: CacheKey) -> Self {
		value.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Resolves the [`CacheKey`] for a credential.
///
/// An explicit override always wins; otherwise the key is `prefix + app_id`. Because
/// application identifiers are unique per credential, derived keys never collide unless an
/// override makes two managers share one on purpose.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyPolicy {
	/// Prefix used for derived keys.
	pub prefix: String,
	/// Explicit key replacing the derived one.
	pub explicit: Option<CacheKey>,
}
impl CacheKeyPolicy {
	/// Replaces the prefix used for derived keys.
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();

		self
	}

	/// Pins the key regardless of the credential.
	pub fn with_explicit(mut self, key: CacheKey) -> Self {
		self.explicit = Some(key);

		self
	}

	/// Returns the key for `app_id` under this policy.
	pub fn resolve(&self, app_id: &AppId) -> CacheKey {
		match &self.explicit {
			Some(key) => key.clone(),
			None => CacheKey(format!("{}{app_id}", self.prefix)),
		}
	}
}
impl Default for CacheKeyPolicy {
	fn default() -> Self {
		Self { prefix: DEFAULT_CACHE_PREFIX.into(), explicit: None }
	}
}
