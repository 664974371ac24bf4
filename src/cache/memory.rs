//! Thread-safe in-memory [`CacheStore`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheEntry, CacheError, CacheFuture, CacheStore},
};

type CacheMap = Arc<RwLock<HashMap<String, CacheEntry>>>;

/// Process-local cache that evicts entries lazily once their TTL elapses.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Returns the expiry instant of the live entry stored under `key`.
	pub fn expires_at(&self, key: &str) -> Option<OffsetDateTime> {
		let now = OffsetDateTime::now_utc();

		self.0
			.read()
			.get(key)
			.filter(|entry| !entry.is_expired_at(now))
			.map(|entry| entry.expires_at)
	}

	/// Returns the number of entries, including ones not yet evicted.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn get_now(map: CacheMap, key: &str, now: OffsetDateTime) -> Option<String> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		// Re-check under the write lock; a concurrent `put` may have replaced the entry.
		if guard.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
			guard.remove(key);
		}

		guard.get(key).map(|entry| entry.value.clone())
	}

	fn put_now(map: CacheMap, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
		let entry = CacheEntry::new(value, OffsetDateTime::now_utc(), ttl);

		map.write().insert(key.to_owned(), entry);

		Ok(())
	}
}
impl CacheStore for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key, OffsetDateTime::now_utc())) })
	}

	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::put_now(map, key, value, ttl) })
	}
}
