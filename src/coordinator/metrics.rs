// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh flights.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	followers: AtomicU64,
	settled_reuses: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of token exchanges started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of flights that produced a new token pair.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of flights that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of waiters that joined another caller's flight.
	pub fn followers(&self) -> u64 {
		self.followers.load(Ordering::Relaxed)
	}

	/// Returns the number of 401s answered from the rotation grace window.
	pub fn settled_reuses(&self) -> u64 {
		self.settled_reuses.load(Ordering::Relaxed)
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

	pub(crate) fn record_follower(&self) {
		self.followers.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_settled_reuse(&self) {
		self.settled_reuses.fetch_add(1, Ordering::Relaxed);
	}
}
