// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters describing how a lease provider served its callers.
#[derive(Debug, Default)]
pub struct LeaseMetrics {
	retrievals: AtomicU64,
	cache_hits: AtomicU64,
	fetches: AtomicU64,
	failures: AtomicU64,
}
impl LeaseMetrics {
	/// Total `retrieve` calls.
	pub fn retrievals(&self) -> u64 {
		self.retrievals.load(Ordering::Relaxed)
	}

	/// Calls answered from the cached lease.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Broker fetches attempted, successful or not.
	pub fn fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Broker fetches that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_retrieval(&self) {
		self.retrievals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch(&self) {
		self.fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
