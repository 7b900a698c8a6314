//! A minimal clock abstraction so cache/rate-limit/activity timing can be
//! driven deterministically in tests without reaching for `tokio`'s
//! fake-time runtime in crates that have no other use for `tokio`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Anything that can report "now" as a monotonic instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
	fn now(&self) -> Instant;
}

/// The real wall clock, backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// A clock whose value is advanced manually, for deterministic tests of
/// TTL/staleness/dedup-window logic.
#[derive(Debug, Clone)]
pub struct FakeClock {
	current: Arc<Mutex<Instant>>,
}

impl FakeClock {
	pub fn new() -> Self {
		Self {
			current: Arc::new(Mutex::new(Instant::now())),
		}
	}

	pub fn advance(&self, by: Duration) {
		let mut guard = self.current.lock();
		*guard += by;
	}
}

impl Default for FakeClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for FakeClock {
	fn now(&self) -> Instant {
		*self.current.lock()
	}
}

/// A cheaply-cloneable handle to any [`Clock`] implementation.
pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
	Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fake_clock_advances_monotonically() {
		let clock = FakeClock::new();
		let t0 = clock.now();
		clock.advance(Duration::from_secs(5));
		assert_eq!(clock.now(), t0 + Duration::from_secs(5));
	}
}
