// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token-endpoint exchanges and cache activity.
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	cache_hits: AtomicU64,
	invalidations: AtomicU64,
}
impl ExchangeMetrics {
	/// Returns the total number of exchanges (or self-signed mints) started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of `get_token` calls served from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of forced invalidations.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}
}
