// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for dispatcher activity.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	attempts: AtomicU64,
	forced_refreshes: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the number of requests sent, counting resends.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of forced token refreshes triggered by authentication rejections.
	pub fn forced_refreshes(&self) -> u64 {
		self.forced_refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of dispatch calls that returned a response.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of dispatch calls that returned an error.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_forced_refresh(&self) {
		self.forced_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
