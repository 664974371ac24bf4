//! Cache contracts and built-in TTL caches for issued access tokens.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CacheStore`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key-value store with native time-to-live expiry.
///
/// The token manager treats the store as opaque: it never tracks expiry itself, so an entry that
/// the store no longer returns is considered expired. Stores may be shared between managers and
/// processes; concurrent `put`s for one key are last-writer-wins.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Returns the live value stored under `key`, if any.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any existing entry, for `ttl`.
	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cached value paired with the instant it stops being served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Stored value.
	pub value: String,
	/// Instant after which the entry is treated as absent.
	pub expires_at: OffsetDateTime,
}
impl CacheEntry {
	/// Creates an entry that lives for `ttl` from `now`.
	pub fn new(value: String, now: OffsetDateTime, ttl: Duration) -> Self {
		Self { value, expires_at: now.saturating_add(ttl) }
	}

	/// Returns `true` once `now` reaches the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}
