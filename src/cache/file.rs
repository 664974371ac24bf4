//! File-backed [`CacheStore`] so tokens survive restarts and can be shared between processes on
//! one host.
//!
//! The JSON snapshot on disk is authoritative. Writers hold an exclusive advisory lock on a
//! sibling `.lock` file while they merge their entry into the current snapshot, and a read that
//! misses in memory reloads the snapshot under a shared lock.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	cache::{CacheEntry, CacheError, CacheFuture, CacheStore},
};

type Snapshot = HashMap<String, CacheEntry>;

/// Persists cache entries to a JSON file after each write.
///
/// Every instance opened on the same path observes the others' writes. Expired entries are
/// dropped whenever the snapshot is loaded or rewritten.
#[derive(Clone, Debug)]
pub struct FileCache {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileCache {
	/// Opens (or creates) a cache at the provided path, eagerly loading live entries.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_live(&path, OffsetDateTime::now_utc())?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the snapshot location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn sibling(&self, extension: &str) -> PathBuf {
		let mut path = self.path.clone();

		path.set_extension(extension);

		path
	}

	fn open_lock(&self) -> Result<File, CacheError> {
		let lock_path = self.sibling("lock");
		OpenOptions::new()
			.create(true)
			.truncate(false)
			.read(true)
			.write(true)
			.open(&lock_path)
			.map_err(|e| CacheError::Backend {
				message: format!("Failed to open lock file {}: {e}", lock_path.display()),
			})
	}

	fn lock_failed(&self, e: std::io::Error) -> CacheError {
		CacheError::Backend { message: format!("Failed to lock {}: {e}", self.path.display()) }
	}

	fn load_live(path: &Path, now: OffsetDateTime) -> Result<Snapshot, CacheError> {
		let mut snapshot = Self::load_snapshot(path)?;

		snapshot.retain(|_, entry| !entry.is_expired_at(now));

		Ok(snapshot)
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, CacheError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| CacheError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| CacheError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), CacheError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CacheError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, contents: &Snapshot) -> Result<(), CacheError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| CacheError::Serialization {
				message: format!("Failed to serialize cache snapshot: {e}"),
			})?;
		let tmp_path = self.sibling("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| CacheError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CacheError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CacheError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CacheStore for FileCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let cached = self
				.inner
				.read()
				.get(key)
				.filter(|entry| !entry.is_expired_at(now))
				.map(|entry| entry.value.clone());

			if cached.is_some() {
				return Ok(cached);
			}

			let lock = self.open_lock()?;

			lock.lock_shared().map_err(|e| self.lock_failed(e))?;

			let snapshot = Self::load_live(&self.path, now)?;
			let value = snapshot.get(key).map(|entry| entry.value.clone());

			*self.inner.write() = snapshot;

			Ok(value)
		})
	}

	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let lock = self.open_lock()?;

			lock.lock().map_err(|e| self.lock_failed(e))?;

			let mut guard = self.inner.write();
			let mut snapshot = Self::load_live(&self.path, now)?;

			snapshot.insert(key.to_owned(), CacheEntry::new(value, now, ttl));
			self.persist(&snapshot)?;

			*guard = snapshot;

			Ok(())
		})
	}
}
